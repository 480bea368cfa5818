//! Session credential handling: attaching the bearer token and the single
//! refresh-and-resubmit after an authentication failure.

use crate::http::{ChainStep, ErrorAction, Failure, FailureKind, RequestContext, RequestDescriptor};
use crate::security::constant_time_compare;
use crate::storage::Storage;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Storage key holding the current bearer token.
pub const TOKEN_STORAGE_KEY: &str = "authenticationToken";

/// Storage key holding the token used to obtain a new bearer token.
pub const REFRESH_TOKEN_STORAGE_KEY: &str = "refreshToken";

/// Opaque session token. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time equality.
    pub fn matches(&self, other: &Credential) -> bool {
        constant_time_compare(&self.0, &other.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("no session to refresh")]
    NoSession,

    #[error("credential refresh rejected with status {0}")]
    Rejected(u16),

    #[error("credential refresh failed: {0}")]
    Transport(String),

    #[error("credential refresh response is malformed: {0}")]
    MalformedResponse(String),
}

/// The authentication subsystem, as seen by the request pipeline.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The credential to attach, if any.
    fn credential(&self) -> Option<Credential>;

    /// Obtain and store a fresh credential.
    async fn refresh(&self) -> Result<Credential, AuthError>;

    /// Forget the current credential.
    fn clear_credential(&self);
}

// ==================== Chain Step ====================

/// Attaches `Authorization: Bearer <token>` and recovers once from a 401.
pub struct AuthAugmenter {
    authenticator: Arc<dyn Authenticator>,
    login_path: String,
}

impl AuthAugmenter {
    pub fn new(authenticator: Arc<dyn Authenticator>, login_path: impl Into<String>) -> Self {
        Self {
            authenticator,
            login_path: login_path.into(),
        }
    }

    fn give_up(&self, failure: Failure) -> ErrorAction {
        ErrorAction::Propagate(failure.with_login_redirect(self.login_path.clone()))
    }
}

#[async_trait]
impl ChainStep for AuthAugmenter {
    fn name(&self) -> &'static str {
        "auth-augmenter"
    }

    fn transform_request(&self, request: RequestDescriptor, ctx: &RequestContext) -> RequestDescriptor {
        let Some(credential) = self.authenticator.credential() else {
            return request;
        };

        match HeaderValue::from_str(&format!("Bearer {}", credential.expose())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.header(AUTHORIZATION, value)
            }
            Err(_) => {
                warn!(request_id = ctx.request_id(), "credential is not a valid header value, sending without it");
                request
            }
        }
    }

    async fn transform_error(&self, failure: Failure, ctx: &RequestContext) -> ErrorAction {
        if failure.kind() != FailureKind::Unauthenticated {
            return ErrorAction::Propagate(failure);
        }

        if ctx.is_retry() || !ctx.can_resubmit() {
            warn!(request_id = ctx.request_id(), "still unauthenticated after refresh");
            return self.give_up(failure);
        }

        // A concurrent request may already have replaced the token this one carried
        let rejected = ctx.dispatched().and_then(bearer_credential);

        if let Some(current) = self.authenticator.credential() {
            if !rejected.as_ref().is_some_and(|rejected| rejected.matches(&current)) {
                info!(request_id = ctx.request_id(), "credential replaced since dispatch, resubmitting request");
                return ErrorAction::Resubmit(ctx.original().clone());
            }
            self.authenticator.clear_credential();
        }

        match self.authenticator.refresh().await {
            Ok(fresh) if rejected.as_ref().is_some_and(|rejected| rejected.matches(&fresh)) => {
                warn!(request_id = ctx.request_id(), "refresh returned the rejected credential");
                self.give_up(failure)
            }
            Ok(_) => {
                info!(request_id = ctx.request_id(), "credential refreshed, resubmitting request");
                ErrorAction::Resubmit(ctx.original().clone())
            }
            Err(e) => {
                warn!(request_id = ctx.request_id(), error = %e, "credential refresh failed");
                self.give_up(failure)
            }
        }
    }
}

/// The bearer token a dispatched request carried, if any.
fn bearer_credential(request: &RequestDescriptor) -> Option<Credential> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| Credential::new(token))
}

// ==================== Token Session ====================

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
}

/// Token-based session persisted in `Storage`.
///
/// Refresh POSTs the stored refresh token to `refresh_url` and expects
/// `{"id_token": "..."}` back.
pub struct TokenSession {
    storage: Arc<dyn Storage>,
    client: reqwest::Client,
    refresh_url: String,
    token: RwLock<Option<Credential>>,
}

impl TokenSession {
    /// Load any persisted token from `storage`.
    pub fn new(storage: Arc<dyn Storage>, client: reqwest::Client, refresh_url: impl Into<String>) -> Self {
        let token = storage.get_item(TOKEN_STORAGE_KEY).map(Credential::new);
        debug!(has_token = token.is_some(), "loaded session");

        Self {
            storage,
            client,
            refresh_url: refresh_url.into(),
            token: RwLock::new(token),
        }
    }

    /// Store a freshly issued token pair.
    pub fn sign_in(&self, token: Credential, refresh_token: Option<&str>) {
        if let Err(e) = self.storage.set_item(TOKEN_STORAGE_KEY, token.expose()) {
            warn!(error = %e, "failed to persist session token");
        }
        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self.storage.set_item(REFRESH_TOKEN_STORAGE_KEY, refresh_token) {
                warn!(error = %e, "failed to persist refresh token");
            }
        }
        *self.token.write().unwrap_or_else(|p| p.into_inner()) = Some(token);
    }

    /// Forget both the session and refresh tokens.
    pub fn sign_out(&self) {
        self.clear_credential();
        if let Err(e) = self.storage.remove_item(REFRESH_TOKEN_STORAGE_KEY) {
            warn!(error = %e, "failed to remove refresh token");
        }
    }
}

#[async_trait]
impl Authenticator for TokenSession {
    fn credential(&self) -> Option<Credential> {
        self.token.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    async fn refresh(&self) -> Result<Credential, AuthError> {
        let refresh_token = self
            .storage
            .get_item(REFRESH_TOKEN_STORAGE_KEY)
            .ok_or(AuthError::NoSession)?;

        let response = self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(response.status().as_u16()));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        let token = Credential::new(body.id_token);
        if let Err(e) = self.storage.set_item(TOKEN_STORAGE_KEY, token.expose()) {
            warn!(error = %e, "failed to persist refreshed token");
        }
        *self.token.write().unwrap_or_else(|p| p.into_inner()) = Some(token.clone());

        debug!("session token refreshed");
        Ok(token)
    }

    fn clear_credential(&self) {
        *self.token.write().unwrap_or_else(|p| p.into_inner()) = None;
        if let Err(e) = self.storage.remove_item(TOKEN_STORAGE_KEY) {
            warn!(error = %e, "failed to remove session token");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{InterceptorChain, Response, Transport, TransportError};
    use crate::storage::MemoryStorage;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    // ==================== Test Doubles ====================

    /// Authenticator with a scripted refresh result.
    struct FakeAuth {
        token: Mutex<Option<Credential>>,
        refresh_to: Option<&'static str>,
        refreshes: AtomicUsize,
        clears: AtomicUsize,
    }

    impl FakeAuth {
        fn new(token: Option<&str>, refresh_to: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                token: Mutex::new(token.map(Credential::new)),
                refresh_to,
                refreshes: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Authenticator for FakeAuth {
        fn credential(&self) -> Option<Credential> {
            self.token.lock().unwrap().clone()
        }

        async fn refresh(&self) -> Result<Credential, AuthError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            let fresh = self.refresh_to.map(Credential::new).ok_or(AuthError::Rejected(401))?;
            *self.token.lock().unwrap() = Some(fresh.clone());
            Ok(fresh)
        }

        fn clear_credential(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
            *self.token.lock().unwrap() = None;
        }
    }

    /// Answers 401 unless the expected bearer token is presented.
    struct TokenGate {
        accept: &'static str,
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Transport for TokenGate {
        async fn dispatch(&self, request: &RequestDescriptor) -> Result<Response, TransportError> {
            let auth = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen.lock().unwrap().push(auth.clone());

            let status = if auth.as_deref() == Some(&format!("Bearer {}", self.accept)[..]) {
                StatusCode::OK
            } else {
                StatusCode::UNAUTHORIZED
            };
            Ok(Response::new(status, HeaderMap::new(), b"items".to_vec()))
        }
    }

    fn gate(accept: &'static str) -> Arc<TokenGate> {
        Arc::new(TokenGate {
            accept,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn chain(transport: Arc<TokenGate>, auth: Arc<FakeAuth>) -> InterceptorChain {
        InterceptorChain::builder(transport)
            .step(AuthAugmenter::new(auth, "/login"))
            .build()
            .unwrap()
    }

    // ==================== Credential Tests ====================

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("super-secret");
        assert!(!format!("{:?}", credential).contains("super-secret"));
    }

    #[test]
    fn test_credential_matches() {
        assert!(Credential::new("abc").matches(&Credential::new("abc")));
        assert!(!Credential::new("abc").matches(&Credential::new("abd")));
    }

    // ==================== transform_request Tests ====================

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let transport = gate("good");
        let chain = chain(transport.clone(), FakeAuth::new(Some("good"), None));

        chain.send(&RequestDescriptor::get("/api/items")).await.unwrap();
        assert_eq!(transport.seen.lock().unwrap()[0].as_deref(), Some("Bearer good"));
    }

    #[tokio::test]
    async fn test_no_credential_no_header() {
        let transport = gate("good");
        let chain = chain(transport.clone(), FakeAuth::new(None, None));

        let failure = chain.send(&RequestDescriptor::get("/api/items")).await.unwrap_err();
        assert_eq!(transport.seen.lock().unwrap()[0], None);
        assert!(failure.requires_login());
    }

    #[test]
    fn test_authorization_header_is_sensitive() {
        let auth = FakeAuth::new(Some("good"), None);
        let step = AuthAugmenter::new(auth, "/login");
        let ctx = RequestContext::for_test(RequestDescriptor::get("/"));

        let request = step.transform_request(RequestDescriptor::get("/"), &ctx);
        assert!(request.headers()[AUTHORIZATION].is_sensitive());
        assert!(!format!("{:?}", request).contains("good"));
    }

    // ==================== transform_error Tests ====================

    #[tokio::test]
    async fn test_refresh_success_resubmits_once() {
        let transport = gate("fresh");
        let auth = FakeAuth::new(Some("expired"), Some("fresh"));
        let chain = chain(transport.clone(), auth.clone());

        let response = chain.send(&RequestDescriptor::get("/api/items")).await.unwrap();
        assert_eq!(response.text(), "items");
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(auth.clears.load(Ordering::SeqCst), 1);
        assert_eq!(
            *transport.seen.lock().unwrap(),
            vec![Some("Bearer expired".to_string()), Some("Bearer fresh".to_string())]
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_propagates_with_login_redirect() {
        let transport = gate("fresh");
        let auth = FakeAuth::new(Some("expired"), None);
        let chain = chain(transport.clone(), auth.clone());

        let failure = chain.send(&RequestDescriptor::get("/api/items")).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Unauthenticated);
        assert_eq!(failure.login_redirect(), Some("/login"));
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
        assert_eq!(auth.credential(), None);
    }

    #[tokio::test]
    async fn test_second_401_is_final() {
        // Refresh "succeeds" but the server still rejects the new token
        let transport = gate("never");
        let auth = FakeAuth::new(Some("expired"), Some("fresh"));
        let chain = chain(transport.clone(), auth.clone());

        let failure = chain.send(&RequestDescriptor::get("/api/items")).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Unauthenticated);
        assert!(failure.requires_login());
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_same_token_from_refresh_is_not_retried() {
        let transport = gate("fresh");
        let auth = FakeAuth::new(Some("expired"), Some("expired"));
        let chain = chain(transport.clone(), auth);

        let failure = chain.send(&RequestDescriptor::get("/api/items")).await.unwrap_err();
        assert!(failure.requires_login());
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_401_with_replaced_credential_resubmits_without_refresh() {
        let auth = FakeAuth::new(Some("fresh"), Some("newer"));
        let step = AuthAugmenter::new(auth.clone(), "/login");
        let sent = RequestDescriptor::get("/api/items")
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer expired"));
        let ctx = RequestContext::for_test(sent);

        let failure = Failure::from_response(Response::new(StatusCode::UNAUTHORIZED, HeaderMap::new(), Vec::new()));
        let action = step.transform_error(failure, &ctx).await;

        assert!(matches!(action, ErrorAction::Resubmit(_)));
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(auth.clears.load(Ordering::SeqCst), 0);
        assert_eq!(auth.credential(), Some(Credential::new("fresh")));
    }

    /// Token gate that holds back its answer to `/held` until released.
    struct HeldGate {
        gate: Arc<TokenGate>,
        held_once: AtomicBool,
        held_dispatched: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl Transport for HeldGate {
        async fn dispatch(&self, request: &RequestDescriptor) -> Result<Response, TransportError> {
            let holding = request.target() == "/held" && !self.held_once.swap(true, Ordering::SeqCst);
            let response = self.gate.dispatch(request).await;
            if holding {
                self.held_dispatched.notify_one();
                self.release.notified().await;
            }
            response
        }
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let transport = Arc::new(HeldGate {
            gate: gate("fresh"),
            held_once: AtomicBool::new(false),
            held_dispatched: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let auth = FakeAuth::new(Some("expired"), Some("fresh"));
        let chain = Arc::new(
            InterceptorChain::builder(transport.clone())
                .step(AuthAugmenter::new(auth.clone(), "/login"))
                .build()
                .unwrap(),
        );

        // B goes out with the expired token and its 401 is held back
        let held = {
            let chain = chain.clone();
            tokio::spawn(async move { chain.send(&RequestDescriptor::get("/held")).await })
        };
        transport.held_dispatched.notified().await;

        // A hits the same 401, refreshes and succeeds
        let first = chain.send(&RequestDescriptor::get("/first")).await;
        assert!(first.is_ok());
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);

        // B's 401 now arrives; it must reuse A's token instead of refreshing again
        transport.release.notify_one();
        let second = held.await.unwrap();

        assert_eq!(second.unwrap().text(), "items");
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(auth.clears.load(Ordering::SeqCst), 1);
        assert_eq!(auth.credential(), Some(Credential::new("fresh")));
    }

    #[tokio::test]
    async fn test_other_failures_pass_through() {
        let auth = FakeAuth::new(Some("token"), Some("fresh"));
        let step = AuthAugmenter::new(auth.clone(), "/login");
        let ctx = RequestContext::for_test(RequestDescriptor::get("/"));

        let action = step
            .transform_error(Failure::new(FailureKind::Forbidden, "no"), &ctx)
            .await;
        assert!(matches!(action, ErrorAction::Propagate(f) if !f.requires_login()));
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 0);
    }

    // ==================== TokenSession Tests ====================

    fn session(storage: Arc<MemoryStorage>, url: String) -> TokenSession {
        TokenSession::new(storage, reqwest::Client::new(), url)
    }

    #[tokio::test]
    async fn test_session_loads_persisted_token() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(TOKEN_STORAGE_KEY, "persisted").unwrap();

        let session = session(storage, "http://unused".into());
        assert_eq!(session.credential(), Some(Credential::new("persisted")));
    }

    #[tokio::test]
    async fn test_session_refresh_stores_new_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/authenticate/refresh"))
            .and(body_json(serde_json::json!({"refresh_token": "r1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id_token": "t2"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let session = session(storage.clone(), format!("{}/api/authenticate/refresh", mock_server.uri()));
        session.sign_in(Credential::new("t1"), Some("r1"));

        let fresh = session.refresh().await.unwrap();
        assert_eq!(fresh.expose(), "t2");
        assert_eq!(session.credential(), Some(Credential::new("t2")));
        assert_eq!(storage.get_item(TOKEN_STORAGE_KEY).as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_session_refresh_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(REFRESH_TOKEN_STORAGE_KEY, "r1").unwrap();
        let session = session(storage, mock_server.uri());

        assert!(matches!(session.refresh().await, Err(AuthError::Rejected(401))));
    }

    #[tokio::test]
    async fn test_session_refresh_without_refresh_token() {
        let session = session(Arc::new(MemoryStorage::new()), "http://unused".into());
        assert!(matches!(session.refresh().await, Err(AuthError::NoSession)));
    }

    #[tokio::test]
    async fn test_session_clear_and_sign_out() {
        let storage = Arc::new(MemoryStorage::new());
        let session = session(storage.clone(), "http://unused".into());
        session.sign_in(Credential::new("t1"), Some("r1"));

        session.clear_credential();
        assert_eq!(session.credential(), None);
        assert_eq!(storage.get_item(TOKEN_STORAGE_KEY), None);
        assert_eq!(storage.get_item(REFRESH_TOKEN_STORAGE_KEY).as_deref(), Some("r1"));

        session.sign_out();
        assert_eq!(storage.get_item(REFRESH_TOKEN_STORAGE_KEY), None);
    }
}
