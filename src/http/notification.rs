use crate::http::{ChainStep, RequestContext, Response};
use crate::notify::{AlertKind, AlertQueue};
use async_trait::async_trait;
use reqwest::header::HeaderName;
use std::time::Duration;
use tracing::debug;

/// Turns a server-sent alert header on a successful response into a
/// `success` alert ("Item created", "Settings saved").
pub struct NotificationStep {
    alerts: AlertQueue,
    header: HeaderName,
    ttl: Option<Duration>,
}

impl NotificationStep {
    pub fn new(alerts: AlertQueue, header: HeaderName, ttl: Option<Duration>) -> Self {
        Self { alerts, header, ttl }
    }
}

#[async_trait]
impl ChainStep for NotificationStep {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn transform_response(&self, response: Response, ctx: &RequestContext) -> Response {
        let message = response
            .headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|message| !message.is_empty());

        if let Some(message) = message {
            let id = self.alerts.push(AlertKind::Success, message, self.ttl);
            debug!(request_id = ctx.request_id(), alert = %id, "server alert queued");
        }

        response
    }
}
