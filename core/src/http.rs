//! Wire-level HTTP types handed to and returned from the transport.
//!
//! # Design
//! `HttpRequest` and `HttpResponse` describe one exchange as plain data. The
//! session builds an `HttpRequest`, hands it to the injected transport and
//! gets an `HttpResponse` back. Nothing here performs I/O, so transports can
//! be real HTTP clients or scripted test doubles.
//!
//! Header names compare case-insensitively on the wire, matching what HTTP
//! clients do when a header is set twice.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use url::Url;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Upper-case wire form of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a request header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeaderKey(Cow<'static, str>);

impl HeaderKey {
    pub const ACCEPT: HeaderKey = HeaderKey(Cow::Borrowed("Accept"));
    pub const AUTHORIZATION: HeaderKey = HeaderKey(Cow::Borrowed("Authorization"));
    pub const CONTENT_TYPE: HeaderKey = HeaderKey(Cow::Borrowed("Content-Type"));
    pub const CONTENT_DISPOSITION: HeaderKey = HeaderKey(Cow::Borrowed("Content-Disposition"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for HeaderKey {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// MIME content type carried by `Content-Type` and `Accept` headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentType(Cow<'static, str>);

impl ContentType {
    pub const JSON: ContentType = ContentType(Cow::Borrowed("application/json"));
    pub const OCTET_STREAM: ContentType = ContentType(Cow::Borrowed("application/octet-stream"));
    pub const TEXT_PLAIN: ContentType = ContentType(Cow::Borrowed("text/plain"));

    pub fn new(value: impl Into<String>) -> Self {
        Self(Cow::Owned(value.into()))
    }

    /// `multipart/form-data` content type for the given boundary.
    pub fn multipart(boundary: &str) -> Self {
        Self(Cow::Owned(format!("multipart/form-data; boundary={boundary}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ContentType {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An HTTP request described as plain data.
///
/// Built by the session from a `Request` and handed to the transport. Never
/// outlives the attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set `name` to `value`, replacing any header with the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}
