//! Body (de)serialization for handlers.
//!
//! The routing core only moves bytes. Handlers that want typed bodies pick a
//! [`Codec`] and go through [`Context::body_as`](crate::dispatcher::Context::body_as)
//! and [`Context::send_encoded`](crate::dispatcher::Context::send_encoded).

use crate::error::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts between raw bodies and typed values for one media type.
pub trait Codec: Send + Sync {
    /// Value for the `Content-Type` header of encoded bodies.
    fn content_type(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns [`CodecError`] when `bytes` is not a valid encoding of `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// # Errors
    ///
    /// Returns [`CodecError`] when `value` cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn content_type(&self) -> &'static str {
        "application/yaml"
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_yaml::from_slice(bytes)?)
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_yaml::to_string(value)?.into_bytes())
    }
}
