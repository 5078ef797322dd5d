use bytes::Bytes;
use serde::Serialize;

use crate::{FetchError, Result};

/// Outgoing request body.
///
/// Only [`Body::Json`] is serialized by the executor (and gets a
/// `content-type: application/json` header); text and byte bodies are sent
/// exactly as given.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Structured value, serialized to JSON on the wire.
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
}

impl Body {
    /// Builds a JSON body from any serializable value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|err| FetchError::Decode(format!("body is not serializable: {err}")))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn bytes(value: impl Into<Bytes>) -> Self {
        Self::Bytes(value.into())
    }

    /// Whether the executor serializes this body and marks it as JSON.
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Wire representation of the body.
    pub(crate) fn into_bytes(self) -> Bytes {
        match self {
            // Serializing an in-memory `serde_json::Value` cannot fail.
            Self::Json(value) => Bytes::from(value.to_string()),
            Self::Text(text) => Bytes::from(text),
            Self::Bytes(bytes) => bytes,
        }
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<&'static [u8]> for Body {
    fn from(value: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(value))
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}
