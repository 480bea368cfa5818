//! Active locale resolution.
//!
//! The resolver owns the process-wide current locale. It is built once at
//! startup, seeded by `resolve_initial`, and afterwards only changes through
//! an explicit `set`.

use crate::i18n::{Locale, LocaleError, LocaleRegistry};
use crate::storage::Storage;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Storage key holding the user's chosen locale tag.
pub const LOCALE_STORAGE_KEY: &str = "locale";

/// Source of the environment's preferred locales, most preferred first.
pub trait LocaleHint: Send + Sync {
    fn preferred(&self) -> Vec<String>;
}

/// Preferences parsed from an `Accept-Language` style list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptLanguage {
    tags: Vec<String>,
}

impl AcceptLanguage {
    /// Parse `"fr-CH, fr;q=0.9, en;q=0.8, *;q=0.5"` into tags ordered by
    /// q-value. Equal weights keep their written order; `*` and any weight
    /// outside `(0, 1]` (including `NaN`) are dropped.
    pub fn parse(header: &str) -> Self {
        let mut weighted: Vec<(String, f32)> = Vec::new();

        for part in header.split(',') {
            let mut pieces = part.split(';');
            let tag = pieces.next().unwrap_or_default().trim();
            if tag.is_empty() || tag == "*" {
                continue;
            }

            let quality = pieces
                .find_map(|piece| piece.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            if !quality.is_finite() || quality <= 0.0 || quality > 1.0 {
                continue;
            }

            weighted.push((tag.to_string(), quality));
        }

        weighted.sort_by(|a, b| b.1.total_cmp(&a.1));

        Self {
            tags: weighted.into_iter().map(|(tag, _)| tag).collect(),
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl LocaleHint for AcceptLanguage {
    fn preferred(&self) -> Vec<String> {
        self.tags.clone()
    }
}

/// Host locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, in that order.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvLocale;

impl LocaleHint for EnvLocale {
    fn preferred(&self) -> Vec<String> {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .filter(|value| !value.is_empty() && value != "C" && value != "POSIX")
            .collect()
    }
}

/// Determines and holds the active locale.
pub struct LocaleResolver {
    storage: Arc<dyn Storage>,
    hint: Arc<dyn LocaleHint>,
    default: Locale,
    current: RwLock<Locale>,
    changes: broadcast::Sender<Locale>,
}

impl LocaleResolver {
    /// Create a resolver whose current locale is `default` until
    /// `resolve_initial` runs.
    pub fn new(storage: Arc<dyn Storage>, hint: Arc<dyn LocaleHint>, default: Locale) -> Self {
        let (changes, _rx) = broadcast::channel(16);
        Self {
            storage,
            hint,
            default,
            current: RwLock::new(default),
            changes,
        }
    }

    /// Seed the current locale at startup.
    ///
    /// Resolution order (highest to lowest priority):
    /// 1. Stored preference (if still supported)
    /// 2. First browser/host hint that negotiates to a supported locale
    /// 3. The configured default
    ///
    /// Writes nothing and emits no change event.
    pub fn resolve_initial(&self) -> Locale {
        let resolved = self
            .stored_preference()
            .or_else(|| self.hinted())
            .unwrap_or(self.default);

        *self.current.write().unwrap_or_else(|p| p.into_inner()) = resolved;
        info!(locale = %resolved, "resolved initial locale");
        resolved
    }

    fn stored_preference(&self) -> Option<Locale> {
        let stored = self.storage.get_item(LOCALE_STORAGE_KEY)?;
        match Locale::from_tag(&stored) {
            Ok(locale) => {
                debug!(locale = %locale, "using stored locale preference");
                Some(locale)
            }
            Err(e) => {
                warn!(stored = %stored, error = %e, "ignoring stored locale preference");
                None
            }
        }
    }

    fn hinted(&self) -> Option<Locale> {
        let locale = self
            .hint
            .preferred()
            .iter()
            .find_map(|tag| Locale::negotiate(tag))?;
        debug!(locale = %locale, "using locale hint");
        Some(locale)
    }

    /// The active locale.
    pub fn current(&self) -> Locale {
        *self.current.read().unwrap_or_else(|p| p.into_inner())
    }

    /// Switch to `tag`, persist it and notify subscribers.
    ///
    /// An unsupported tag is rejected: the current locale stays as it was
    /// and nothing is written. A storage failure is logged and the switch
    /// still applies for this process.
    pub fn set(&self, tag: &str) -> Result<Locale, LocaleError> {
        let locale = Locale::from_tag(tag).map_err(|e| {
            warn!(tag = %tag, error = %e, "rejected locale change");
            e
        })?;

        if let Err(e) = self.storage.set_item(LOCALE_STORAGE_KEY, locale.tag()) {
            warn!(locale = %locale, error = %e, "failed to persist locale preference");
        }

        let previous = {
            let mut current = self.current.write().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *current, locale)
        };

        if previous != locale {
            info!(from = %previous, to = %locale, "locale changed");
            // No subscribers is fine.
            let _ = self.changes.send(locale);
        }

        Ok(locale)
    }

    /// Receive every subsequent locale change.
    pub fn subscribe(&self) -> broadcast::Receiver<Locale> {
        self.changes.subscribe()
    }

    /// All selectable locales, in registry order.
    pub fn supported(&self) -> Vec<Locale> {
        LocaleRegistry::get()
            .list_enabled()
            .into_iter()
            .filter_map(|config| Locale::from_tag(config.tag).ok())
            .collect()
    }
}
