use crate::http::classify::classify;
use crate::http::{Response, TransportError};
use reqwest::StatusCode;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Fixed failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// No response received (connection refused, DNS, timeout)
    Network,
    /// 4xx other than 401 and 403
    Client,
    /// 403
    Forbidden,
    /// 401
    Unauthenticated,
    /// 5xx
    Server,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "NETWORK",
            FailureKind::Client => "CLIENT",
            FailureKind::Forbidden => "FORBIDDEN",
            FailureKind::Unauthenticated => "UNAUTHENTICATED",
            FailureKind::Server => "SERVER",
            FailureKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed terminal failure of a request.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    kind: FailureKind,
    status: Option<StatusCode>,
    message: String,
    response: Option<Response>,
    login_redirect: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            response: None,
            login_redirect: None,
        }
    }

    /// The transport could not produce a response.
    pub fn transport(error: &TransportError) -> Self {
        Self::new(classify(None), error.to_string())
    }

    /// The server answered with an error status.
    pub fn from_response(response: Response) -> Self {
        let status = response.status();
        Self {
            kind: classify(Some(status)),
            status: Some(status),
            message: format!("HTTP {}", status),
            response: Some(response),
            login_redirect: None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error response, when the server sent one.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Where the caller should send the user to authenticate, if anywhere.
    pub fn login_redirect(&self) -> Option<&str> {
        self.login_redirect.as_deref()
    }

    pub fn requires_login(&self) -> bool {
        self.login_redirect.is_some()
    }

    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.login_redirect = Some(path.into());
        self
    }
}
