//! Request interceptor chain.
//!
//! Every request passes through the same ordered list of steps:
//!
//! 1. `transform_request` of each step, in order, builds the outgoing request
//! 2. the transport dispatches it
//! 3. on success, `transform_response` of each step, in the *same* order
//! 4. on failure, `transform_error` of each step, in the same order, until
//!    one recovers or asks for a resubmission
//!
//! A resubmission re-runs the whole sequence once. The chain refuses a second
//! one, which keeps a step that "fixes" an error from looping on it.

use crate::http::{Failure, RequestDescriptor, Response, Transport};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Resubmissions allowed per request.
pub const MAX_RESUBMISSIONS: u32 = 1;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain step '{0}' is registered more than once")]
    DuplicateStep(&'static str),
}

/// Per-invocation state handed to every step.
///
/// Steps are shared between concurrent requests and must keep anything
/// request-specific here rather than in their own fields.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: u64,
    attempt: u32,
    original: RequestDescriptor,
    dispatched: Option<RequestDescriptor>,
}

impl RequestContext {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// 0 for the first dispatch, 1 for the resubmission.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }

    pub fn can_resubmit(&self) -> bool {
        self.attempt < MAX_RESUBMISSIONS
    }

    /// The descriptor exactly as the caller passed it, before any step ran.
    pub fn original(&self) -> &RequestDescriptor {
        &self.original
    }

    /// The request of the current attempt as handed to the transport, after
    /// every request transform. `None` while request transforms run.
    pub fn dispatched(&self) -> Option<&RequestDescriptor> {
        self.dispatched.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn for_test(original: RequestDescriptor) -> Self {
        Self {
            request_id: 0,
            attempt: 0,
            dispatched: Some(original.clone()),
            original,
        }
    }
}

/// What a step decided to do with a failure.
#[derive(Debug)]
pub enum ErrorAction {
    /// Hand the (possibly annotated) failure to the next step.
    Propagate(Failure),
    /// Resolve the request with this response instead.
    Recover(Response),
    /// Dispatch this request again through the full chain.
    Resubmit(RequestDescriptor),
}

/// A pluggable transform applied to every request, response and failure.
#[async_trait]
pub trait ChainStep: Send + Sync {
    /// Unique within a chain.
    fn name(&self) -> &'static str;

    fn transform_request(&self, request: RequestDescriptor, _ctx: &RequestContext) -> RequestDescriptor {
        request
    }

    fn transform_response(&self, response: Response, _ctx: &RequestContext) -> Response {
        response
    }

    async fn transform_error(&self, failure: Failure, _ctx: &RequestContext) -> ErrorAction {
        ErrorAction::Propagate(failure)
    }
}

enum Outcome {
    Resolved(Response),
    Failed(Failure),
    Resubmit(RequestDescriptor),
}

/// Assembles a chain. Order of `step` calls is the execution order.
pub struct ChainBuilder {
    transport: Arc<dyn Transport>,
    steps: Vec<Arc<dyn ChainStep>>,
}

impl ChainBuilder {
    pub fn step(self, step: impl ChainStep + 'static) -> Self {
        self.shared_step(Arc::new(step))
    }

    pub fn shared_step(mut self, step: Arc<dyn ChainStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Validate and freeze the step order.
    pub fn build(self) -> Result<InterceptorChain, ChainError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name()) {
                return Err(ChainError::DuplicateStep(step.name()));
            }
        }

        Ok(InterceptorChain {
            transport: self.transport,
            steps: self.steps,
            next_request_id: AtomicU64::new(1),
        })
    }
}

/// The ordered pipeline every request goes through.
pub struct InterceptorChain {
    transport: Arc<dyn Transport>,
    steps: Vec<Arc<dyn ChainStep>>,
    next_request_id: AtomicU64,
}

impl InterceptorChain {
    pub fn builder(transport: Arc<dyn Transport>) -> ChainBuilder {
        ChainBuilder {
            transport,
            steps: Vec::new(),
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run `request` through the chain and return its terminal outcome.
    ///
    /// The caller never observes the intermediate failure of a resubmitted
    /// request, only the result of the last dispatch.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<Response, Failure> {
        let mut ctx = RequestContext {
            request_id: self.next_request_id.fetch_add(1, Ordering::Relaxed),
            attempt: 0,
            original: request.clone(),
            dispatched: None,
        };
        let mut outgoing = request.clone();

        loop {
            match self.attempt(outgoing, &ctx).await {
                Outcome::Resolved(response) => {
                    debug!(request_id = ctx.request_id, status = %response.status(), "request resolved");
                    return Ok(response);
                }
                Outcome::Failed(failure) => {
                    debug!(request_id = ctx.request_id, kind = %failure.kind(), "request failed");
                    return Err(failure);
                }
                Outcome::Resubmit(next) => {
                    ctx.attempt += 1;
                    debug!(request_id = ctx.request_id, attempt = ctx.attempt, "resubmitting request");
                    outgoing = next;
                }
            }
        }
    }

    async fn attempt(&self, request: RequestDescriptor, ctx: &RequestContext) -> Outcome {
        let request = self
            .steps
            .iter()
            .fold(request, |request, step| step.transform_request(request, ctx));

        let ctx = &RequestContext {
            dispatched: Some(request.clone()),
            ..ctx.clone()
        };

        let mut failure = match self.transport.dispatch(&request).await {
            Ok(response) if !response.is_error() => {
                let response = self
                    .steps
                    .iter()
                    .fold(response, |response, step| step.transform_response(response, ctx));
                return Outcome::Resolved(response);
            }
            Ok(response) => Failure::from_response(response),
            Err(e) => {
                debug!(request_id = ctx.request_id, error = %e, "transport failure");
                Failure::transport(&e)
            }
        };

        for step in &self.steps {
            let handed = if ctx.can_resubmit() {
                None
            } else {
                Some(failure.clone())
            };

            match step.transform_error(failure, ctx).await {
                ErrorAction::Propagate(next) => failure = next,
                ErrorAction::Recover(response) => {
                    debug!(request_id = ctx.request_id, step = step.name(), "failure recovered");
                    return Outcome::Resolved(response);
                }
                ErrorAction::Resubmit(next) => match handed {
                    None => return Outcome::Resubmit(next),
                    Some(previous) => {
                        warn!(
                            request_id = ctx.request_id,
                            step = step.name(),
                            "resubmission limit reached, propagating failure"
                        );
                        failure = previous;
                    }
                },
            }
        }

        Outcome::Failed(failure)
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("steps", &self.step_names())
            .finish()
    }
}
