//! The request pipeline.
//!
//! # Design
//! One attempt runs these stages strictly in sequence:
//!
//! ```text
//! adapt request -> build -> transport -> validate -> decode -> adapt output -> observe
//! ```
//!
//! Transport and validation failures are offered to the interceptor chain
//! for rescue with the caller's original descriptor. When the returned
//! action completes, a new attempt starts from the original descriptor; when
//! it fails, its error is final. Every other failure (request adaptation,
//! building, decoding, output adaptation) ends the exchange immediately.
//!
//! Each attempt reports its outcome to `received_response` exactly once,
//! before rescue is consulted. A failed rescue action reports its
//! replacement error as well, so the final outcome is always observed.
//!
//! The state machine exists once, as an async function. The stream flavour
//! (`publisher`, `send_publisher`) wraps the same future in a one-item
//! stream, so both flavours issue identical interceptor callbacks.
//!
//! Retries are not capped. Dropping the returned future cancels the exchange
//! at whatever stage it is suspended in (transport call or rescue action).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{debug, debug_span, Instrument};
use url::Url;

use crate::builder::build_request;
use crate::coder::{DataDecoder, DataEncoder, JsonCoder};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::interceptor::Interceptor;
use crate::request::{Request, RequestDescriptor};
use crate::transport::Transport;
use crate::validate::validate;

/// Sends `Request`s through a transport, decoding typed outputs.
///
/// Cloning is cheap; clones share configuration and transport.
pub struct Session<E = JsonCoder, D = JsonCoder> {
    inner: Arc<SessionInner<E, D>>,
}

struct SessionInner<E, D> {
    config: SessionConfig<E, D>,
    transport: Arc<dyn Transport>,
}

/// Turns a validated response body into the output.
type Finish<E, D, Output> = fn(&SessionConfig<E, D>, &[u8], &RequestDescriptor) -> Result<Output>;

/// How one attempt ended.
enum Attempt<Output> {
    /// Terminal result, already observed.
    Finished(Result<Output>),
    /// Rescuable failure, not yet observed.
    Failed {
        error: Error,
        request: RequestDescriptor,
    },
}

impl<E, D> Clone for Session<E, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E, D> fmt::Debug for Session<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<E, D> Session<E, D>
where
    E: DataEncoder + 'static,
    D: DataDecoder + 'static,
{
    pub fn new(config: SessionConfig<E, D>, transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                transport: Arc::new(transport),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig<E, D> {
        &self.inner.config
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.config.base_url
    }

    /// Send `request` and decode the response into `Output`.
    ///
    /// A `Request<()>` accepts an empty body without consulting the decoder.
    pub async fn request<Output>(&self, request: Request<Output>) -> Result<Output>
    where
        Output: DeserializeOwned + Send + 'static,
    {
        self.execute(request.into_descriptor(), decode_output::<E, D, Output>).await
    }

    /// Send a request that has no output. The response body is neither
    /// decoded nor adapted; interceptors observe `()` on success.
    pub async fn send(&self, request: Request<()>) -> Result<()> {
        self.execute(request.into_descriptor(), discard_output::<E, D>).await
    }

    /// Stream flavour of [`Session::request`]: emits the output or the error,
    /// then completes.
    pub fn publisher<Output>(&self, request: Request<Output>) -> BoxStream<'static, Result<Output>>
    where
        Output: DeserializeOwned + Send + 'static,
    {
        let session = self.clone();
        stream::once(async move { session.request(request).await }).boxed()
    }

    /// Stream flavour of [`Session::send`].
    pub fn send_publisher(&self, request: Request<()>) -> BoxStream<'static, Result<()>> {
        let session = self.clone();
        stream::once(async move { session.send(request).await }).boxed()
    }

    async fn execute<Output>(&self, original: RequestDescriptor, finish: Finish<E, D, Output>) -> Result<Output>
    where
        Output: Send + 'static,
    {
        let interceptors = &self.inner.config.interceptors;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let span = debug_span!("attempt", attempt, method = %original.method, path = %original.path);

            let (error, request) = match self.attempt(&original, finish).instrument(span).await {
                Attempt::Finished(result) => return result,
                Attempt::Failed { error, request } => (error, request),
            };

            debug!(attempt, path = %original.path, error = %error, "attempt failed");
            interceptors.received_response(Err(&error), &request);

            let Some(rescue) = interceptors.rescue_request(&original, &error) else {
                return Err(error);
            };

            debug!(attempt, path = %original.path, "running rescue action");
            if let Err(err) = rescue.run().await {
                let error = Error::from_rescue(err);
                debug!(attempt, path = %original.path, error = %error, "rescue action failed");
                interceptors.received_response(Err(&error), &request);
                return Err(error);
            }
            debug!(attempt, path = %original.path, "rescue completed, retrying");
        }
    }

    async fn attempt<Output>(&self, original: &RequestDescriptor, finish: Finish<E, D, Output>) -> Attempt<Output>
    where
        Output: Send + 'static,
    {
        let config = &self.inner.config;

        let request = match config.interceptors.adapt_request(original.clone()) {
            Ok(request) => request,
            Err(err) => return Attempt::Finished(self.observe(Err(Error::Interceptor(err)), original)),
        };

        let accept = config.decoder.content_type();
        let wire = match build_request(&request, &config.base_url, &config.encoder, &accept) {
            Ok(wire) => wire,
            Err(err) => return Attempt::Finished(self.observe(Err(err), &request)),
        };

        debug!(method = %wire.method, url = %wire.url, "sending request");
        let response = match self.inner.transport.send(wire).await {
            Ok(response) => response,
            Err(err) => {
                return Attempt::Failed {
                    error: Error::Transport(err),
                    request,
                }
            }
        };

        if let Err(error) = validate(&response, config.error_converter.as_deref()) {
            return Attempt::Failed { error, request };
        }
        debug!(status = response.status, bytes = response.body.len(), "response validated");

        let result = finish(config, &response.body[..], &request);
        Attempt::Finished(self.observe(result, &request))
    }

    /// Report a terminal result to every interceptor and hand it back.
    fn observe<Output>(&self, result: Result<Output>, request: &RequestDescriptor) -> Result<Output>
    where
        Output: Send + 'static,
    {
        let interceptors = &self.inner.config.interceptors;
        match &result {
            Ok(output) => interceptors.received_response(Ok(output as &(dyn Any + Send)), request),
            Err(err) => interceptors.received_response(Err(err), request),
        }
        result
    }
}

fn decode_output<E, D, Output>(config: &SessionConfig<E, D>, body: &[u8], request: &RequestDescriptor) -> Result<Output>
where
    D: DataDecoder,
    Output: DeserializeOwned + Send + 'static,
{
    let mut output = match empty_unit::<Output>(body) {
        Some(output) => output,
        None => config.decoder.decode::<Output>(body).map_err(Error::Decoding)?,
    };
    config
        .interceptors
        .adapt_output(&mut output, request)
        .map_err(Error::Interceptor)?;
    Ok(output)
}

/// `()` for an empty body when the request expects no output.
fn empty_unit<Output: 'static>(body: &[u8]) -> Option<Output> {
    let mut slot: Option<Output> = None;
    if body.is_empty() {
        if let Some(unit) = (&mut slot as &mut dyn Any).downcast_mut::<Option<()>>() {
            *unit = Some(());
        }
    }
    slot
}

fn discard_output<E, D>(_config: &SessionConfig<E, D>, _body: &[u8], _request: &RequestDescriptor) -> Result<()> {
    Ok(())
}
