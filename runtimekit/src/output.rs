//! Handler results and their response encoding

use bytes::Bytes;
use serde::Serialize;

/// Value returned by a handler for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutput {
    /// Sent to the control plane byte-for-byte
    Text(String),
    /// Already-encoded JSON document
    Json(Bytes),
    /// Arbitrary bytes, sent unchanged even when they are not UTF-8
    Raw(Bytes),
}

impl InvocationOutput {
    /// Encode any serializable value as JSON.
    ///
    /// Encoding happens here so struct field order is preserved.
    pub fn json<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value).map(|encoded| Self::Json(Bytes::from(encoded)))
    }

    /// Request body for the `/response` endpoint
    pub fn into_body(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text),
            Self::Json(encoded) | Self::Raw(encoded) => encoded,
        }
    }
}

impl From<String> for InvocationOutput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for InvocationOutput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for InvocationOutput {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(Bytes::from(value.to_string()))
    }
}

impl From<Bytes> for InvocationOutput {
    fn from(value: Bytes) -> Self {
        Self::Raw(value)
    }
}

impl From<Vec<u8>> for InvocationOutput {
    fn from(value: Vec<u8>) -> Self {
        Self::Raw(Bytes::from(value))
    }
}

/// Handlers with nothing to return respond with JSON `null`
impl From<()> for InvocationOutput {
    fn from((): ()) -> Self {
        Self::Json(Bytes::from_static(b"null"))
    }
}
