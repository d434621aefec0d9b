//! Request descriptors.
//!
//! # Design
//! [`RequestDescriptor`] describes one logical request without any network or
//! encoding logic. [`Request<Output>`] wraps it with the output type the
//! response decodes into, so `Session::request` can return a typed value.
//! Interceptors work on the untyped descriptor.
//!
//! Descriptors are cheap to clone: payloads sit behind an `Arc` and multipart
//! parts share their byte sources. The session clones the caller's
//! descriptor for every attempt so a rescued request restarts from the
//! original, unadapted form.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::http::{HeaderKey, HttpMethod};
use crate::multipart::MultipartFormData;

/// A serializable request payload, rendered when the request is built.
#[derive(Clone)]
pub struct Payload(Arc<dyn Fn() -> serde_json::Result<Value> + Send + Sync>);

impl Payload {
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self(Arc::new(move || serde_json::to_value(&value)))
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        (self.0)()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// Request body.
#[derive(Debug, Clone)]
pub enum Body {
    /// Serialized through the session's `DataEncoder`.
    Encodable(Payload),
    /// Serialized as `multipart/form-data`.
    Multipart(MultipartFormData),
}

/// Untyped description of one request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Body>,
    pub parameters: BTreeMap<String, String>,
    pub headers: BTreeMap<HeaderKey, String>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>, body: Option<Body>) -> Self {
        Self {
            path: path.into(),
            method,
            body,
            parameters: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    /// Merge `headers` into the descriptor; values in `headers` win on collision.
    pub fn merge_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<HeaderKey>,
        V: Into<String>,
    {
        for (key, value) in headers {
            self.headers.insert(key.into(), value.into());
        }
    }

    pub fn header(&self, key: &HeaderKey) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

/// A request expecting an `Output` response.
///
/// `Request<()>` is the no-output form sent with `Session::send`.
pub struct Request<Output> {
    descriptor: RequestDescriptor,
    output: PhantomData<fn() -> Output>,
}

impl<Output> Request<Output> {
    fn new(method: HttpMethod, path: impl Into<String>, body: Option<Body>) -> Self {
        Self::from_descriptor(RequestDescriptor::new(method, path, body))
    }

    pub fn from_descriptor(descriptor: RequestDescriptor) -> Self {
        Self {
            descriptor,
            output: PhantomData,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path, None)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path, None)
    }

    pub fn post<B>(path: impl Into<String>, body: B) -> Self
    where
        B: Serialize + Send + Sync + 'static,
    {
        Self::new(HttpMethod::Post, path, Some(Body::Encodable(Payload::new(body))))
    }

    /// POST without a body.
    pub fn post_empty(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path, None)
    }

    pub fn put<B>(path: impl Into<String>, body: B) -> Self
    where
        B: Serialize + Send + Sync + 'static,
    {
        Self::new(HttpMethod::Put, path, Some(Body::Encodable(Payload::new(body))))
    }

    pub fn post_multipart(path: impl Into<String>, form: MultipartFormData) -> Self {
        Self::new(HttpMethod::Post, path, Some(Body::Multipart(form)))
    }

    pub fn put_multipart(path: impl Into<String>, form: MultipartFormData) -> Self {
        Self::new(HttpMethod::Put, path, Some(Body::Multipart(form)))
    }

    /// Add query parameters; a repeated name keeps the last value.
    pub fn with_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in parameters {
            self.descriptor.parameters.insert(name.into(), value.into());
        }
        self
    }

    /// Merge headers into the request; later values win on collision.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<HeaderKey>,
        V: Into<String>,
    {
        self.descriptor.merge_headers(headers);
        self
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn into_descriptor(self) -> RequestDescriptor {
        self.descriptor
    }
}

impl<Output> Deref for Request<Output> {
    type Target = RequestDescriptor;

    fn deref(&self) -> &RequestDescriptor {
        &self.descriptor
    }
}

impl<Output> Clone for Request<Output> {
    fn clone(&self) -> Self {
        Self::from_descriptor(self.descriptor.clone())
    }
}

impl<Output> fmt::Debug for Request<Output> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("descriptor", &self.descriptor)
            .field("output", &std::any::type_name::<Output>())
            .finish()
    }
}
