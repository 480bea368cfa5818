//! Error classification and user-facing error alerts.

use crate::http::{ChainStep, ErrorAction, Failure, FailureKind, RequestContext};
use crate::i18n::{AlertStrings, LocaleResolver};
use crate::notify::{AlertKind, AlertQueue};
use async_trait::async_trait;
use reqwest::header::HeaderName;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Map a response status (or its absence) onto the failure taxonomy.
pub fn classify(status: Option<StatusCode>) -> FailureKind {
    let Some(status) = status else {
        return FailureKind::Network;
    };

    match status {
        StatusCode::UNAUTHORIZED => FailureKind::Unauthenticated,
        StatusCode::FORBIDDEN => FailureKind::Forbidden,
        s if s.is_client_error() => FailureKind::Client,
        s if s.is_server_error() => FailureKind::Server,
        _ => FailureKind::Unknown,
    }
}

/// Mirrors every failure that reaches it to the alert queue, localized by
/// its kind. The kind itself is assigned where the failure is created.
///
/// Never recovers and never swallows: the failure always continues to the
/// caller. Register it after any step that may resolve a failure silently
/// (the auth augmenter), so a recovered 401 produces no alert.
pub struct ErrorClassifier {
    alerts: AlertQueue,
    locale: Arc<LocaleResolver>,
    ttl: Option<Duration>,
    error_header: Option<HeaderName>,
}

impl ErrorClassifier {
    pub fn new(alerts: AlertQueue, locale: Arc<LocaleResolver>, ttl: Option<Duration>) -> Self {
        Self {
            alerts,
            locale,
            ttl,
            error_header: None,
        }
    }

    /// Prefer the server's own message from `header` when a failed response
    /// carries it.
    pub fn with_error_header(mut self, header: HeaderName) -> Self {
        self.error_header = Some(header);
        self
    }

    fn message_for(&self, failure: &Failure, kind: FailureKind) -> String {
        let server_message = self.error_header.as_ref().and_then(|header| {
            failure
                .response()
                .and_then(|response| response.headers().get(header))
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|message| !message.is_empty())
        });

        match server_message {
            Some(message) => message.to_string(),
            None => AlertStrings::for_locale(self.locale.current())
                .failure(kind)
                .to_string(),
        }
    }
}

#[async_trait]
impl ChainStep for ErrorClassifier {
    fn name(&self) -> &'static str {
        "error-classifier"
    }

    async fn transform_error(&self, failure: Failure, ctx: &RequestContext) -> ErrorAction {
        let kind = failure.kind();
        let message = self.message_for(&failure, kind);

        info!(
            request_id = ctx.request_id(),
            kind = %kind,
            status = ?failure.status().map(|s| s.as_u16()),
            target = ctx.original().target(),
            "request failed"
        );
        self.alerts.push(AlertKind::Error, message.clone(), self.ttl);

        ErrorAction::Propagate(failure.with_message(message))
    }
}
