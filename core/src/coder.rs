//! Body encoder and decoder capabilities.
//!
//! The session serializes `Encodable` request bodies through a
//! [`DataEncoder`] and decodes response bodies through a [`DataDecoder`].
//! Each capability advertises the content type it produces or accepts, which
//! becomes the request's `Content-Type` and `Accept` header respectively.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::BoxError;
use crate::http::ContentType;

/// Serializes request payloads.
///
/// Payloads reach the encoder as a `serde_json::Value` tree, which any serde
/// data format can serialize.
pub trait DataEncoder: Send + Sync {
    fn content_type(&self) -> ContentType;

    fn encode(&self, value: &Value) -> Result<Vec<u8>, BoxError>;
}

/// Deserializes response bodies into the expected output type.
pub trait DataDecoder: Send + Sync {
    fn content_type(&self) -> ContentType;

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, BoxError>;
}

/// JSON encoder and decoder backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCoder;

impl DataEncoder for JsonCoder {
    fn content_type(&self) -> ContentType {
        ContentType::JSON
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, BoxError> {
        Ok(serde_json::to_vec(value)?)
    }
}

impl DataDecoder for JsonCoder {
    fn content_type(&self) -> ContentType {
        ContentType::JSON
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(data)?)
    }
}
