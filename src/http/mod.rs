//! Outgoing request pipeline: descriptors, the interceptor chain, its steps
//! and the transport underneath.

mod auth;
mod chain;
pub mod classify;
mod client;
mod failure;
mod locale;
mod notification;
mod request;
mod response;
mod transport;

pub use auth::{
    AuthAugmenter, AuthError, Authenticator, Credential, TokenSession, REFRESH_TOKEN_STORAGE_KEY,
    TOKEN_STORAGE_KEY,
};
pub use chain::{ChainBuilder, ChainError, ChainStep, ErrorAction, InterceptorChain, RequestContext, MAX_RESUBMISSIONS};
pub use classify::ErrorClassifier;
pub use client::{ApiClient, PendingRequest};
pub use failure::{Failure, FailureKind};
pub use locale::LocaleAugmenter;
pub use notification::NotificationStep;
pub use request::RequestDescriptor;
pub use response::Response;
pub use transport::{ReqwestTransport, Transport, TransportError};
