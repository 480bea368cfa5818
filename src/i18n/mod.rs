//! Internationalization (i18n) module.
//!
//! This module owns everything locale-related: which locales exist, how a raw
//! tag becomes a validated `Locale`, which locale is active for this process,
//! and the localized alert strings shown when a request fails.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for all supported locales and their metadata
//! - `locale`: Type-safe `Locale` that can only hold a supported, enabled tag
//! - `resolver`: Process-scoped active locale with persistence and change events
//! - `strings`: Localized failure messages
//!
//! # Example
//!
//! ```rust,ignore
//! use agatha_client::i18n::{AcceptLanguage, Locale, LocaleResolver};
//!
//! let resolver = LocaleResolver::new(storage, Arc::new(AcceptLanguage::parse("es-MX, en;q=0.5")), Locale::default_locale());
//! resolver.resolve_initial(); // "es"
//! resolver.set("fr")?;
//! ```

mod locale;
mod registry;
mod resolver;
mod strings;

pub use locale::{normalize_tag, Locale, LocaleError};
pub use registry::{LocaleConfig, LocaleRegistry};
pub use resolver::{AcceptLanguage, EnvLocale, LocaleHint, LocaleResolver, LOCALE_STORAGE_KEY};
pub use strings::AlertStrings;
