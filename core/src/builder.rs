//! Turns a `RequestDescriptor` into an `HttpRequest`.
//!
//! # Design
//! Building is pure: the same descriptor, base URL and coders always yield
//! the same `HttpRequest` (multipart file parts aside, which are read from
//! disk). Header precedence, lowest first:
//!
//! 1. `Content-Type` derived from the body encoding,
//! 2. headers set on the descriptor,
//! 3. `Accept` derived from the decoder, only when the descriptor set none.

use std::collections::BTreeMap;

use url::Url;

use crate::coder::DataEncoder;
use crate::error::{Error, UrlError};
use crate::http::{ContentType, HeaderKey, HttpRequest};
use crate::request::{Body, RequestDescriptor};

/// Build the wire request for `descriptor`.
pub fn build_request<E>(
    descriptor: &RequestDescriptor,
    base_url: &Url,
    encoder: &E,
    accept: &ContentType,
) -> Result<HttpRequest, Error>
where
    E: DataEncoder + ?Sized,
{
    let url = request_url(base_url, &descriptor.path, &descriptor.parameters)?;
    let mut request = HttpRequest::new(descriptor.method, url);

    match &descriptor.body {
        Some(Body::Encodable(payload)) => {
            let value = payload.to_value().map_err(|err| Error::Encoding(Box::new(err)))?;
            let bytes = encoder.encode(&value).map_err(Error::Encoding)?;
            request.body = Some(bytes.into());
            request.set_header(HeaderKey::CONTENT_TYPE.as_str(), encoder.content_type().as_str());
        }
        Some(Body::Multipart(form)) => {
            request.body = Some(form.encode()?.into());
            request.set_header(HeaderKey::CONTENT_TYPE.as_str(), form.content_type().as_str());
        }
        None => {}
    }

    for (key, value) in &descriptor.headers {
        request.set_header(key.as_str(), value.as_str());
    }

    if request.header(HeaderKey::ACCEPT.as_str()).is_none() {
        request.set_header(HeaderKey::ACCEPT.as_str(), accept.as_str());
    }

    Ok(request)
}

/// Append `path` to `base_url` and add `parameters` after any query items
/// already on the base.
///
/// `path` is taken segment by segment: `?`, `#`, `.` and `..` segments are
/// rejected rather than resolved.
pub fn request_url(
    base_url: &Url,
    path: &str,
    parameters: &BTreeMap<String, String>,
) -> Result<Url, UrlError> {
    let dot_segment = path.split('/').any(|segment| segment == "." || segment == "..");
    if dot_segment || path.contains(['?', '#']) {
        return Err(UrlError::InvalidPath(path.to_string()));
    }

    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| UrlError::CannotBeABase(base_url.to_string()))?
        .pop_if_empty()
        .extend(path.split('/').filter(|segment| !segment.is_empty()));

    if !parameters.is_empty() {
        url.query_pairs_mut().extend_pairs(parameters.iter());
    }

    Ok(url)
}
