//! Transport capability.
//!
//! The session never performs network I/O itself. It hands each
//! `HttpRequest` to a [`Transport`] and waits for the `HttpResponse`.
//! Transports come in two shapes and the session accepts both:
//!
//! - suspending: an async function, wrapped with [`transport_fn`],
//! - stream-based: a function returning a stream whose first item is the
//!   response, wrapped with [`stream_transport`].
//!
//! Redirects, TLS, timeouts and connection reuse are the transport's concern.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use crate::error::BoxError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        (**self).send(request).await
    }
}

/// Transport backed by an async function.
#[derive(Debug, Clone)]
pub struct FnTransport<F>(F);

/// Wrap an async function as a [`Transport`].
pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse, BoxError>> + Send + 'static,
{
    FnTransport(f)
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse, BoxError>> + Send + 'static,
{
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        (self.0)(request).await
    }
}

/// Transport backed by a function returning a response stream.
#[derive(Debug, Clone)]
pub struct StreamTransport<F>(F);

/// Wrap a stream-returning function as a [`Transport`].
///
/// Only the first item is used. A stream that ends without emitting fails
/// with [`EmptyResponseStream`].
pub fn stream_transport<F>(f: F) -> StreamTransport<F>
where
    F: Fn(HttpRequest) -> BoxStream<'static, Result<HttpResponse, BoxError>> + Send + Sync,
{
    StreamTransport(f)
}

#[async_trait]
impl<F> Transport for StreamTransport<F>
where
    F: Fn(HttpRequest) -> BoxStream<'static, Result<HttpResponse, BoxError>> + Send + Sync,
{
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        let mut responses = (self.0)(request);
        match responses.next().await {
            Some(result) => result,
            None => Err(Box::new(EmptyResponseStream)),
        }
    }
}

/// A stream transport completed without emitting a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("response stream completed without a response")]
pub struct EmptyResponseStream;
