//! Response status validation.
//!
//! A response is successful when its status is in `200..300`. Anything else
//! becomes an [`HttpError`], unless a [`DataErrorConverter`] recognizes the
//! error body and turns it into a domain error. Converters never see empty
//! bodies.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::{BoxError, Error, HttpError};
use crate::http::HttpResponse;

/// Converts a non-2xx response body into a domain error.
pub trait DataErrorConverter: Send + Sync {
    /// Return `None` when the body is not recognized; the generic
    /// `HttpError` is surfaced instead.
    fn convert(&self, error: &HttpError, body: &[u8]) -> Option<BoxError>;
}

impl<F> DataErrorConverter for F
where
    F: Fn(&HttpError, &[u8]) -> Option<BoxError> + Send + Sync,
{
    fn convert(&self, error: &HttpError, body: &[u8]) -> Option<BoxError> {
        self(error, body)
    }
}

/// Converter decoding JSON error bodies into `T`.
pub struct JsonErrorConverter<T> {
    target: PhantomData<fn() -> T>,
}

impl<T> JsonErrorConverter<T> {
    pub fn new() -> Self {
        Self { target: PhantomData }
    }
}

impl<T> Default for JsonErrorConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonErrorConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonErrorConverter")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> DataErrorConverter for JsonErrorConverter<T>
where
    T: DeserializeOwned + std::error::Error + Send + Sync + 'static,
{
    fn convert(&self, _error: &HttpError, body: &[u8]) -> Option<BoxError> {
        serde_json::from_slice::<T>(body)
            .ok()
            .map(|err| Box::new(err) as BoxError)
    }
}

/// Check the response status, converting error bodies when possible.
pub fn validate(response: &HttpResponse, converter: Option<&dyn DataErrorConverter>) -> Result<(), Error> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }

    let error = HttpError::new(response.status);
    if response.body.is_empty() {
        return Err(Error::Http(error));
    }

    match converter.and_then(|converter| converter.convert(&error, &response.body)) {
        Some(domain) => Err(Error::Converted(domain)),
        None => Err(Error::Http(error)),
    }
}
