//! Locale type: validated language-region tag.
//!
//! A `Locale` can only be constructed for a tag that is registered and
//! enabled, so holding one is proof that it is supported.

use crate::i18n::{LocaleConfig, LocaleRegistry};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use thiserror::Error;

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocaleError {
    #[error("malformed locale tag: '{0}'")]
    Malformed(String),

    #[error("unsupported locale: '{0}'")]
    Unsupported(String),

    #[error("locale '{0}' is not enabled")]
    Disabled(String),
}

/// A supported, enabled locale.
#[derive(Clone, Copy)]
pub struct Locale {
    config: &'static LocaleConfig,
}

impl Locale {
    /// Create a Locale from a raw tag.
    ///
    /// The tag is normalized first (`en_gb` and `EN-GB.UTF-8` both become
    /// `en-GB`), then matched exactly against the registry.
    ///
    /// # Returns
    /// * `Ok(Locale)` if the normalized tag is registered and enabled
    /// * `Err(LocaleError)` otherwise
    pub fn from_tag(raw: &str) -> Result<Locale, LocaleError> {
        let tag = normalize_tag(raw).ok_or_else(|| LocaleError::Malformed(raw.to_string()))?;

        match LocaleRegistry::get().get_by_tag(&tag) {
            Some(config) if config.enabled => Ok(Locale { config }),
            Some(_) => Err(LocaleError::Disabled(tag)),
            None => Err(LocaleError::Unsupported(tag)),
        }
    }

    /// Like `from_tag`, but falls back to the primary language subtag when
    /// the exact region is not supported (`es-MX` negotiates to `es`).
    ///
    /// Used for browser hints, never for explicit user choices.
    pub fn negotiate(raw: &str) -> Option<Locale> {
        if let Ok(locale) = Locale::from_tag(raw) {
            return Some(locale);
        }

        let tag = normalize_tag(raw)?;
        let (language, _) = tag.split_once('-')?;
        Locale::from_tag(language).ok()
    }

    /// The registry's fallback locale.
    pub fn default_locale() -> Locale {
        Locale {
            config: LocaleRegistry::get().default_locale(),
        }
    }

    /// Normalized tag (e.g., "en-GB").
    pub fn tag(&self) -> &'static str {
        self.config.tag
    }

    /// Primary language subtag (e.g., "en" for "en-GB").
    pub fn language(&self) -> &'static str {
        self.config.language()
    }

    pub fn config(&self) -> &'static LocaleConfig {
        self.config
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn native_name(&self) -> &'static str {
        self.config.native_name
    }

    pub fn is_default(&self) -> bool {
        self.config.is_default
    }
}

impl PartialEq for Locale {
    fn eq(&self, other: &Self) -> bool {
        self.config.tag == other.config.tag
    }
}

impl Eq for Locale {}

impl Hash for Locale {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.config.tag.hash(state);
    }
}

impl fmt::Debug for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Locale").field(&self.config.tag).finish()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config.tag)
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.config.tag)
    }
}

/// Normalize a raw tag into `language[-REGION]` form.
///
/// Strips encoding suffixes (`.UTF-8`) and variants (`@latin`), turns `_`
/// into `-`, lower-cases the language and upper-cases the region. Returns
/// `None` when the result is not a two-part-at-most language tag.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let stripped = raw.trim().split(['.', '@']).next().unwrap_or_default().trim();
    if stripped.is_empty() {
        return None;
    }

    let mut parts = stripped.split(['-', '_']);
    let language = parts.next()?.to_ascii_lowercase();
    let region = parts.next().map(|r| r.to_ascii_uppercase());
    if parts.next().is_some() {
        return None;
    }

    let candidate = match region {
        Some(region) => format!("{}-{}", language, region),
        None => language,
    };

    let regex = TAG_REGEX.get_or_init(|| Regex::new(r"^[a-z]{2,3}(-[A-Z]{2}|-[0-9]{3})?$").unwrap());
    regex.is_match(&candidate).then_some(candidate)
}
