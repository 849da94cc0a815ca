//! Pluggable serialization for structured values.
//!
//! A codec is passed per call to `CredentialStore::get_value` and
//! `CredentialStore::insert_value`. The store never inspects the encoded bytes.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Encode/decode failure reported by a [`Codec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("{format} encode failed: {message}")]
    Encode {
        /// Name of the wire format.
        format: &'static str,
        /// Message from the serializer.
        message: String,
    },
    /// The bytes could not be deserialized into the requested type.
    #[error("{format} decode failed: {message}")]
    Decode {
        /// Name of the wire format.
        format: &'static str,
        /// Message from the deserializer.
        message: String,
    },
}

impl CodecError {
    /// Creates an encode error.
    pub fn encode<S: ToString>(format: &'static str, message: S) -> Self {
        Self::Encode {
            format,
            message: message.to_string(),
        }
    }

    /// Creates a decode error.
    pub fn decode<S: ToString>(format: &'static str, message: S) -> Self {
        Self::Decode {
            format,
            message: message.to_string(),
        }
    }
}

/// Converts values to and from the opaque bytes held by the store.
pub trait Codec {
    /// Serializes `value` into bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes a value from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the bytes are malformed for `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::encode("json", e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::decode("json", e))
    }
}

/// CBOR codec backed by `ciborium`. More compact than JSON for binary fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl Codec for CborCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        ciborium::into_writer(value, &mut out).map_err(|e| CodecError::encode("cbor", e))?;
        Ok(out)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::decode("cbor", e))
    }
}
