//! Locale registry: Single source of truth for all supported locales.
//!
//! This module provides a centralized registry of every locale the client can
//! present itself in. It uses a singleton pattern with `OnceLock` to ensure
//! thread-safe initialization and access.

use std::sync::OnceLock;

/// Configuration for a supported locale.
#[derive(Debug, Clone)]
pub struct LocaleConfig {
    /// Normalized language tag (e.g., "en", "en-GB")
    pub tag: &'static str,

    /// English name of the locale (e.g., "English (United Kingdom)")
    pub name: &'static str,

    /// Native name of the locale (e.g., "Español", "Français")
    pub native_name: &'static str,

    /// Whether this is the fallback locale (only one should be true)
    pub is_default: bool,

    /// Whether this locale can be selected
    pub enabled: bool,
}

impl LocaleConfig {
    /// Primary language subtag ("en" for "en-GB").
    pub fn language(&self) -> &'static str {
        match self.tag.split_once('-') {
            Some((language, _)) => language,
            None => self.tag,
        }
    }
}

/// Global locale registry singleton.
///
/// Initialized once on first access and immutable thereafter.
pub struct LocaleRegistry {
    locales: Vec<LocaleConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LocaleRegistry> = OnceLock::new();

impl LocaleRegistry {
    /// Get the global locale registry instance.
    pub fn get() -> &'static LocaleRegistry {
        REGISTRY.get_or_init(|| LocaleRegistry {
            locales: default_locales(),
        })
    }

    /// Get a locale configuration by its normalized tag.
    ///
    /// # Returns
    /// * `Some(&LocaleConfig)` if the locale exists (enabled or not)
    /// * `None` if the tag is not registered
    pub fn get_by_tag(&self, tag: &str) -> Option<&LocaleConfig> {
        self.locales.iter().find(|locale| locale.tag == tag)
    }

    /// Get all enabled locales, in registration order.
    pub fn list_enabled(&self) -> Vec<&LocaleConfig> {
        self.locales.iter().filter(|locale| locale.enabled).collect()
    }

    /// Get all locales (including disabled ones).
    pub fn list_all(&self) -> Vec<&LocaleConfig> {
        self.locales.iter().collect()
    }

    /// Get the default locale configuration.
    ///
    /// Falls back to the first registered locale if no entry is flagged as
    /// default, so lookups never fail on an incomplete table.
    pub fn default_locale(&self) -> &LocaleConfig {
        self.locales
            .iter()
            .find(|locale| locale.is_default)
            .unwrap_or(&self.locales[0])
    }

    /// Check if a tag is registered and enabled.
    pub fn is_enabled(&self, tag: &str) -> bool {
        self.get_by_tag(tag)
            .map(|locale| locale.enabled)
            .unwrap_or(false)
    }
}

/// Default locale configurations.
///
/// English is the fallback. German is registered but not yet selectable.
fn default_locales() -> Vec<LocaleConfig> {
    vec![
        LocaleConfig {
            tag: "en",
            name: "English",
            native_name: "English",
            is_default: true,
            enabled: true,
        },
        LocaleConfig {
            tag: "en-GB",
            name: "English (United Kingdom)",
            native_name: "English (United Kingdom)",
            is_default: false,
            enabled: true,
        },
        LocaleConfig {
            tag: "es",
            name: "Spanish",
            native_name: "Español",
            is_default: false,
            enabled: true,
        },
        LocaleConfig {
            tag: "fr",
            name: "French",
            native_name: "Français",
            is_default: false,
            enabled: true,
        },
        LocaleConfig {
            tag: "de",
            name: "German",
            native_name: "Deutsch",
            is_default: false,
            enabled: false,
        },
    ]
}
