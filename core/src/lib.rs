//! Asynchronous HTTP client toolkit.
//!
//! # Overview
//! Describes requests as typed values, turns them into wire requests and
//! runs them through an injected [`Transport`]. The core never opens a
//! socket: the caller supplies the transport, making the pipeline fully
//! deterministic and testable.
//!
//! # Design
//! - `Request<Output>` carries the expected output type; the untyped
//!   [`RequestDescriptor`] is what interceptors see and adapt.
//! - Building (`builder`), validating (`validate`) and multipart encoding
//!   (`multipart`) are pure functions over owned values.
//! - [`Session`] owns the pipeline state machine: adapt, build, send,
//!   validate, decode, adapt output, observe, and rescue-then-retry.
//! - Encoders, decoders, error converters, interceptors and the transport
//!   are traits so every seam can be replaced in tests.

pub mod builder;
pub mod coder;
pub mod config;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod multipart;
pub mod request;
pub mod session;
pub mod transport;
pub mod validate;

pub use coder::{DataDecoder, DataEncoder, JsonCoder};
pub use config::SessionConfig;
pub use error::{BoxError, Error, HttpError, MultipartError, Result, UrlError};
pub use http::{ContentType, HeaderKey, HttpMethod, HttpRequest, HttpResponse};
pub use interceptor::{Interceptor, InterceptorChain, Outcome, RescueAction, TracingInterceptor};
pub use multipart::{ByteSource, MultipartFormData};
pub use request::{Body, Request, RequestDescriptor};
pub use session::Session;
pub use transport::{stream_transport, transport_fn, Transport};
pub use validate::{DataErrorConverter, JsonErrorConverter};
