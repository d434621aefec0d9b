//! Interceptors and their composition.
//!
//! # Design
//! An [`Interceptor`] is consulted at four points of every exchange:
//!
//! - `adapt_request` before the wire request is built,
//! - `adapt_output` after the response body is decoded,
//! - `received_response` with the outcome of each attempt,
//! - `rescue_request` when an attempt fails with a rescuable error.
//!
//! The trait is object safe so interceptors for any output type can share
//! one chain. Outputs reach interceptors as `dyn Any`; an interceptor that
//! cares about a specific output type downcasts to it and ignores the rest.
//!
//! Rescue is unbounded. An interceptor returning a [`RescueAction`] for
//! every failure retries forever, so interceptors keep their own attempt
//! counters (or token state) and stop offering actions when done.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{Stream, StreamExt};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::{BoxError, Error};
use crate::request::RequestDescriptor;

/// Outcome of one attempt as seen by `received_response`.
pub type Outcome<'a> = Result<&'a (dyn Any + Send), &'a Error>;

/// Hooks into the request pipeline. Every method defaults to a no-op.
pub trait Interceptor: Send + Sync {
    /// Adapt the request before it is built. Errors end the exchange.
    fn adapt_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor, BoxError> {
        Ok(request)
    }

    /// Adapt the decoded output in place. Errors end the exchange.
    fn adapt_output(&self, _output: &mut (dyn Any + Send), _request: &RequestDescriptor) -> Result<(), BoxError> {
        Ok(())
    }

    /// Observe the outcome of an attempt.
    fn received_response(&self, _result: Outcome<'_>, _request: &RequestDescriptor) {}

    /// Offer an action that may fix `error`. When the action completes the
    /// whole request is retried from the original descriptor.
    fn rescue_request(&self, _request: &RequestDescriptor, _error: &Error) -> Option<RescueAction> {
        None
    }
}

/// Deferred work run to rescue a failed request.
///
/// Completing signals "retry now"; failing replaces the original error.
pub struct RescueAction(BoxFuture<'static, Result<(), BoxError>>);

impl RescueAction {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self(future.boxed())
    }

    /// Rescue driven by a stream: the first item decides. An `Ok` item or
    /// completion without items retries, an `Err` item gives up.
    pub fn from_stream<S, T>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, BoxError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut stream = stream.boxed();
        Self::new(async move {
            match stream.next().await {
                Some(Err(err)) => Err(err),
                Some(Ok(_)) | None => Ok(()),
            }
        })
    }

    pub async fn run(self) -> Result<(), BoxError> {
        self.0.await
    }
}

impl fmt::Debug for RescueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RescueAction(..)")
    }
}

/// Ordered list of interceptors acting as one.
///
/// Requests and outputs are adapted left to right, each interceptor seeing
/// the previous one's result. Every interceptor observes every outcome.
/// Rescue goes to the first interceptor offering an action.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: impl Interceptor + 'static) -> &mut Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn push_shared(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl FromIterator<Arc<dyn Interceptor>> for InterceptorChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Interceptor>>>(iter: I) -> Self {
        Self {
            interceptors: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

impl Interceptor for InterceptorChain {
    fn adapt_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor, BoxError> {
        self.interceptors
            .iter()
            .try_fold(request, |request, interceptor| interceptor.adapt_request(request))
    }

    fn adapt_output(&self, output: &mut (dyn Any + Send), request: &RequestDescriptor) -> Result<(), BoxError> {
        for interceptor in &self.interceptors {
            interceptor.adapt_output(output, request)?;
        }
        Ok(())
    }

    fn received_response(&self, result: Outcome<'_>, request: &RequestDescriptor) {
        for interceptor in &self.interceptors {
            interceptor.received_response(result, request);
        }
    }

    fn rescue_request(&self, request: &RequestDescriptor, error: &Error) -> Option<RescueAction> {
        self.interceptors
            .iter()
            .find_map(|interceptor| interceptor.rescue_request(request, error))
    }
}

/// Logs every attempt outcome through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor;

impl Interceptor for TracingInterceptor {
    fn received_response(&self, result: Outcome<'_>, request: &RequestDescriptor) {
        match result {
            Ok(_) => debug!(method = %request.method, path = %request.path, "request succeeded"),
            Err(err) => warn!(method = %request.method, path = %request.path, error = %err, "request failed"),
        }
    }
}
