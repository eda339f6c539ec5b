//! Payload Codecs
//!
//! Converts message keys and values to the bytes handed to the broker.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

/// A message key or value before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw bytes, passed through untouched
    Bytes(Vec<u8>),
    /// UTF-8 text, encoded without quoting
    Text(String),
    /// Structured JSON document
    Json(serde_json::Value),
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Codec failures.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
}

/// Serializer/deserializer pair for broker payloads.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Registry name of the codec.
    fn name(&self) -> &'static str;

    /// Encodes a payload to bytes.
    fn dumps(&self, payload: &Payload) -> Result<Vec<u8>, CodecError>;

    /// Decodes bytes back into a payload.
    fn loads(&self, bytes: &[u8]) -> Result<Payload, CodecError>;
}

/// Shared codec handle carried by pending messages.
pub type CodecRef = Arc<dyn Codec>;

/// JSON codec. Text is written verbatim, documents are compacted.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Decodes bytes straight into a typed document.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn dumps(&self, payload: &Payload) -> Result<Vec<u8>, CodecError> {
        match payload {
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Text(text) => Ok(text.as_bytes().to_vec()),
            Payload::Json(value) => Ok(serde_json::to_vec(value)?),
        }
    }

    fn loads(&self, bytes: &[u8]) -> Result<Payload, CodecError> {
        if bytes.is_empty() {
            return Ok(Payload::Json(serde_json::Value::Null));
        }
        Ok(Payload::Json(serde_json::from_slice(bytes)?))
    }
}

/// Pass-through codec for keys and opaque values.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn dumps(&self, payload: &Payload) -> Result<Vec<u8>, CodecError> {
        match payload {
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Text(text) => Ok(text.as_bytes().to_vec()),
            Payload::Json(serde_json::Value::String(text)) => Ok(text.as_bytes().to_vec()),
            Payload::Json(value) => Ok(serde_json::to_vec(value)?),
        }
    }

    fn loads(&self, bytes: &[u8]) -> Result<Payload, CodecError> {
        Ok(Payload::Bytes(bytes.to_vec()))
    }
}

/// Looks up a codec by its configured name.
pub fn codec_by_name(name: &str) -> Result<CodecRef, CodecError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(Arc::new(JsonCodec)),
        "raw" | "bytes" => Ok(Arc::new(RawCodec)),
        other => Err(CodecError::UnknownCodec(other.to_owned())),
    }
}

/// Serializes an optional payload. An absent payload stays absent so the
/// broker records a null key or tombstone value.
pub fn serialize(payload: Option<&Payload>, codec: &dyn Codec) -> Result<Option<Vec<u8>>, CodecError> {
    payload.map(|p| codec.dumps(p)).transpose()
}
