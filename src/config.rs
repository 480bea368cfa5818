use crate::i18n::Locale;
use anyhow::{bail, Context, Result};
use reqwest::header::HeaderName;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub api_base_url: String,
    pub request_timeout_secs: u64,

    // Locale
    pub default_locale: String,

    // Storage
    pub storage_path: PathBuf,
    pub storage_prefix: String,

    // Alerts
    pub alert_capacity: usize,
    pub alert_ttl_ms: u64,
    pub alert_header: String,
    pub error_header: String,

    // Authentication
    pub auth_refresh_url: String,
    pub login_path: String,
}

impl Default for Config {
    fn default() -> Self {
        let api_base_url = "http://localhost:8080".to_string();
        Self {
            auth_refresh_url: default_refresh_url(&api_base_url),
            api_base_url,
            request_timeout_secs: 30,
            default_locale: "en".to_string(),
            storage_path: PathBuf::from("data/storage.json"),
            storage_prefix: "jhi".to_string(),
            alert_capacity: 5,
            alert_ttl_ms: 5000,
            alert_header: "x-agatha-alert".to_string(),
            error_header: "x-agatha-error".to_string(),
            login_path: "/login".to_string(),
        }
    }
}

fn default_refresh_url(base: &str) -> String {
    format!("{}/api/authenticate/refresh", base.trim_end_matches('/'))
}

/// Parse `key` if set, falling back to `default` when unset or invalid.
fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = key, value = %raw, "invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn string_var(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let api_base_url = string_var("API_BASE_URL", defaults.api_base_url);
        let auth_refresh_url = string_var("AUTH_REFRESH_URL", default_refresh_url(&api_base_url));

        let config = Self {
            api_base_url,
            request_timeout_secs: parsed_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),

            default_locale: string_var("DEFAULT_LOCALE", defaults.default_locale),

            storage_path: std::env::var("STORAGE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            storage_prefix: string_var("STORAGE_PREFIX", defaults.storage_prefix),

            alert_capacity: parsed_var("ALERT_CAPACITY", defaults.alert_capacity),
            alert_ttl_ms: parsed_var("ALERT_TTL_MS", defaults.alert_ttl_ms),
            alert_header: string_var("ALERT_HEADER", defaults.alert_header),
            error_header: string_var("ERROR_HEADER", defaults.error_header),

            auth_refresh_url,
            login_path: string_var("LOGIN_PATH", defaults.login_path),
        };

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Reject settings the client cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.alert_capacity == 0 {
            bail!("ALERT_CAPACITY must be at least 1");
        }
        self.locale()?;
        self.alert_header_name()?;
        self.error_header_name()?;
        Ok(())
    }

    pub fn locale(&self) -> Result<Locale> {
        Locale::from_tag(&self.default_locale)
            .with_context(|| format!("DEFAULT_LOCALE '{}' is not supported", self.default_locale))
    }

    /// `None` when alerts should stay until dismissed.
    pub fn alert_ttl(&self) -> Option<Duration> {
        (self.alert_ttl_ms > 0).then(|| Duration::from_millis(self.alert_ttl_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn alert_header_name(&self) -> Result<HeaderName> {
        HeaderName::from_str(&self.alert_header)
            .with_context(|| format!("ALERT_HEADER '{}' is not a valid header name", self.alert_header))
    }

    pub fn error_header_name(&self) -> Result<HeaderName> {
        HeaderName::from_str(&self.error_header)
            .with_context(|| format!("ERROR_HEADER '{}' is not a valid header name", self.error_header))
    }
}
