//! Application context: builds the shared services once and wires them into
//! the request pipeline.

use crate::config::Config;
use crate::http::{
    ApiClient, AuthAugmenter, Authenticator, ErrorClassifier, InterceptorChain, LocaleAugmenter,
    NotificationStep, ReqwestTransport, TokenSession, Transport,
};
use crate::i18n::{EnvLocale, LocaleHint, LocaleResolver};
use crate::notify::AlertQueue;
use crate::storage::{FileStorage, Prefixed, Storage};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Key separator used with `Config::storage_prefix`.
pub const STORAGE_SEPARATOR: &str = "-";

pub struct App {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub locale: Arc<LocaleResolver>,
    pub alerts: AlertQueue,
    pub session: Arc<dyn Authenticator>,
    pub client: ApiClient,
}

impl App {
    /// Assemble the client from explicit collaborators.
    ///
    /// Step order is fixed: locale, auth, notification, error classifier.
    /// The classifier runs last so a 401 the auth step resolves never
    /// reaches the user as an alert.
    pub fn bootstrap(
        config: Config,
        storage: Arc<dyn Storage>,
        hint: Arc<dyn LocaleHint>,
        session: Arc<dyn Authenticator>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let locale = Arc::new(LocaleResolver::new(storage.clone(), hint, config.locale()?));
        locale.resolve_initial();

        let alerts = AlertQueue::new(config.alert_capacity).context("Failed to create alert queue")?;

        let chain = InterceptorChain::builder(transport)
            .step(LocaleAugmenter::new(locale.clone()))
            .step(AuthAugmenter::new(session.clone(), config.login_path.clone()))
            .step(NotificationStep::new(
                alerts.clone(),
                config.alert_header_name()?,
                config.alert_ttl(),
            ))
            .step(
                ErrorClassifier::new(alerts.clone(), locale.clone(), config.alert_ttl())
                    .with_error_header(config.error_header_name()?),
            )
            .build()
            .context("Failed to assemble request chain")?;

        info!(steps = ?chain.step_names(), locale = %locale.current(), "client ready");

        Ok(Self {
            config,
            storage,
            locale,
            alerts,
            session,
            client: ApiClient::new(Arc::new(chain)),
        })
    }

    /// Production wiring: file storage, host locale, `reqwest` transport and
    /// a token session.
    pub fn from_config(config: Config) -> Result<Self> {
        let file = FileStorage::open(&config.storage_path)
            .with_context(|| format!("Failed to open storage at {}", config.storage_path.display()))?;
        let storage: Arc<dyn Storage> = Arc::new(Prefixed::new(file, config.storage_prefix.clone(), STORAGE_SEPARATOR));

        let transport = ReqwestTransport::new(config.api_base_url.clone(), config.request_timeout())
            .context("Failed to build HTTP client")?;
        let session = Arc::new(TokenSession::new(
            storage.clone(),
            transport.client().clone(),
            config.auth_refresh_url.clone(),
        ));

        Self::bootstrap(config, storage, Arc::new(EnvLocale), session, Arc::new(transport))
    }
}
