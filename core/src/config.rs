//! Session configuration.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::coder::{DataDecoder, DataEncoder, JsonCoder};
use crate::error::UrlError;
use crate::interceptor::{Interceptor, InterceptorChain};
use crate::validate::DataErrorConverter;

/// Configuration shared by every request a `Session` sends.
///
/// # Example
///
/// ```ignore
/// use httpkit_core::{JsonErrorConverter, SessionConfig, TracingInterceptor};
///
/// let config = SessionConfig::new("https://api.example.com/v1")?
///     .interceptor(TracingInterceptor)
///     .error_converter(JsonErrorConverter::<ApiProblem>::new());
/// ```
pub struct SessionConfig<E = JsonCoder, D = JsonCoder> {
    /// Common prefix of every request URL.
    pub base_url: Url,

    /// Encoder for `Encodable` request bodies.
    pub encoder: E,

    /// Decoder for response bodies; its content type is sent as `Accept`.
    pub decoder: D,

    /// Interceptors consulted for every request, in order.
    pub interceptors: InterceptorChain,

    /// Converter turning non-2xx error bodies into domain errors.
    pub error_converter: Option<Arc<dyn DataErrorConverter>>,
}

impl SessionConfig {
    /// Create a JSON config for `base_url`.
    pub fn new(base_url: &str) -> Result<Self, UrlError> {
        let url = Url::parse(base_url).map_err(|source| UrlError::InvalidBase {
            base: base_url.to_string(),
            source,
        })?;
        Ok(Self::from_url(url))
    }

    pub fn from_url(base_url: Url) -> Self {
        Self {
            base_url,
            encoder: JsonCoder,
            decoder: JsonCoder,
            interceptors: InterceptorChain::new(),
            error_converter: None,
        }
    }
}

impl<E, D> SessionConfig<E, D>
where
    E: DataEncoder,
    D: DataDecoder,
{
    /// Replace the body encoder.
    pub fn encoder<E2: DataEncoder>(self, encoder: E2) -> SessionConfig<E2, D> {
        SessionConfig {
            base_url: self.base_url,
            encoder,
            decoder: self.decoder,
            interceptors: self.interceptors,
            error_converter: self.error_converter,
        }
    }

    /// Replace the response decoder.
    pub fn decoder<D2: DataDecoder>(self, decoder: D2) -> SessionConfig<E, D2> {
        SessionConfig {
            base_url: self.base_url,
            encoder: self.encoder,
            decoder,
            interceptors: self.interceptors,
            error_converter: self.error_converter,
        }
    }

    /// Append an interceptor to the chain.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Append a shared interceptor, keeping a handle to it.
    pub fn shared_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push_shared(interceptor);
        self
    }

    /// Replace the whole interceptor chain.
    pub fn interceptors(mut self, interceptors: InterceptorChain) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn error_converter(mut self, converter: impl DataErrorConverter + 'static) -> Self {
        self.error_converter = Some(Arc::new(converter));
        self
    }
}

impl<E, D> fmt::Debug for SessionConfig<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_url", &self.base_url.as_str())
            .field("interceptors", &self.interceptors)
            .field("error_converter", &self.error_converter.is_some())
            .finish_non_exhaustive()
    }
}
