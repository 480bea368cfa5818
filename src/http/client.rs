//! Caller-facing facade over the interceptor chain.

use crate::http::{Failure, FailureKind, InterceptorChain, RequestDescriptor, Response};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Issues requests. Every call goes through the full chain.
#[derive(Debug, Clone)]
pub struct ApiClient {
    chain: Arc<InterceptorChain>,
}

impl ApiClient {
    pub fn new(chain: Arc<InterceptorChain>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &InterceptorChain {
        &self.chain
    }

    pub async fn send(&self, request: &RequestDescriptor) -> Result<Response, Failure> {
        self.chain.send(request).await
    }

    pub async fn get(&self, path: &str) -> Result<Response, Failure> {
        self.send(&RequestDescriptor::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, Failure> {
        self.send(&RequestDescriptor::delete(path)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, Failure> {
        let request = RequestDescriptor::post(path).json(body).map_err(encode_failure)?;
        self.send(&request).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, Failure> {
        let request = RequestDescriptor::put(path).json(body).map_err(encode_failure)?;
        self.send(&request).await
    }

    /// Run `request` on its own task.
    ///
    /// The caller may stop waiting at any time; the request still runs to
    /// completion, so any alert it raises is raised exactly once.
    pub fn spawn(&self, request: RequestDescriptor) -> PendingRequest {
        let chain = self.chain.clone();
        let handle = tokio::spawn(async move { chain.send(&request).await });
        PendingRequest { handle }
    }
}

fn encode_failure(error: serde_json::Error) -> Failure {
    Failure::new(FailureKind::Unknown, format!("failed to encode request body: {}", error))
}

/// A request running in the background. Await it for the outcome.
///
/// Dropping it detaches the task instead of cancelling it.
#[derive(Debug)]
pub struct PendingRequest {
    handle: JoinHandle<Result<Response, Failure>>,
}

impl PendingRequest {
    /// Stop waiting for the outcome.
    pub fn abandon(self) {
        debug!("request abandoned by caller");
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for PendingRequest {
    type Output = Result<Response, Failure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| {
            joined.unwrap_or_else(|e| {
                warn!(error = %e, "request task did not complete");
                Err(Failure::new(FailureKind::Unknown, format!("request task failed: {}", e)))
            })
        })
    }
}
