//! Error types for the request pipeline.
//!
//! # Design
//! Errors fall into two groups. Build failures (`Url`, `Encoding`,
//! `Multipart`), `Decoding` and `Interceptor` errors end the exchange at
//! once. `Transport`, `Http` and `Converted` errors are offered to the
//! interceptor chain for rescue first, see [`Error::is_rescuable`].
//!
//! Errors produced by injected capabilities (transport, coders, error
//! converter, interceptors) are carried as [`BoxError`] so callers can get
//! their own error type back with [`Error::downcast_ref`].

use thiserror::Error;

/// Type-erased error produced by an injected capability.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for pipeline operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by `Session` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The request path and base URL could not be combined.
    #[error("invalid url: {0}")]
    Url(#[from] UrlError),

    /// The body encoder rejected the request payload.
    #[error("body encoding failed: {0}")]
    Encoding(#[source] BoxError),

    /// The multipart body could not be encoded.
    #[error("multipart encoding failed: {0}")]
    Multipart(#[from] MultipartError),

    /// The transport failed before producing a response.
    #[error("transport failed: {0}")]
    Transport(#[source] BoxError),

    /// The server answered with a non-2xx status.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A non-2xx error body converted into a domain error.
    #[error(transparent)]
    Converted(BoxError),

    /// The response body did not match the expected output type.
    #[error("response decoding failed: {0}")]
    Decoding(#[source] BoxError),

    /// An interceptor failed while adapting, or its rescue action gave up.
    #[error("interceptor failed: {0}")]
    Interceptor(#[source] BoxError),
}

impl Error {
    /// Whether this failure is offered to the interceptor chain for rescue.
    pub fn is_rescuable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Http(_) | Error::Converted(_))
    }

    /// Status code of an `Http` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(err) => Some(err.status),
            _ => None,
        }
    }

    /// Borrow the capability error carried by this error as `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Error::Encoding(err)
            | Error::Transport(err)
            | Error::Converted(err)
            | Error::Decoding(err)
            | Error::Interceptor(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Turn the error a rescue action failed with into the terminal error.
    ///
    /// A rescue action that failed with a pipeline `Error` (for example a
    /// token refresh made through the same session) surfaces it unchanged.
    pub(crate) fn from_rescue(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(err) => *err,
            Err(other) => Error::Interceptor(other),
        }
    }
}

/// Non-2xx HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("HTTP {status}")]
pub struct HttpError {
    pub status: u16,
}

impl HttpError {
    pub fn new(status: u16) -> Self {
        Self { status }
    }
}

/// Failures combining a base URL with a request path and parameters.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("invalid base url {base:?}: {source}")]
    InvalidBase {
        base: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base url {0} cannot carry path segments")]
    CannotBeABase(String),

    #[error("invalid path {0:?}: query, fragment and dot segments are not allowed")]
    InvalidPath(String),
}

/// Failures encoding a multipart form.
#[derive(Debug, Error)]
pub enum MultipartError {
    /// A part's source yielded a different number of bytes than declared.
    #[error("part length mismatch: expected {expected} bytes, read {actual}")]
    PartLengthMismatch { expected: u64, actual: u64 },

    /// A part's source could not be opened.
    #[error("part source unavailable: {0}")]
    SourceUnavailable(#[source] std::io::Error),

    /// Reading an opened part source failed.
    #[error("reading part source failed: {0}")]
    ReadFailed(#[source] std::io::Error),

    /// The size of a file could not be determined when adding it.
    #[error("file size not available for {path}: {source}")]
    FileSizeUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
