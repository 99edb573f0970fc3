//! Structured error reported to the control plane

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification used when a handler error carries no type of its own
pub const UNKNOWN_REASON: &str = "Extension.UnknownReason";

/// Error shape accepted by the `/init/error` and `/invocation/{id}/error`
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{error_message}")]
pub struct RuntimeError {
    pub error_message: String,
    pub error_type: String,
    #[serde(default)]
    pub stack_trace: Vec<String>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            error_type: error_type.into(),
            stack_trace: Vec::new(),
        }
    }

    pub fn with_stack_trace<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack_trace = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Convert an arbitrary error into the reported shape.
    ///
    /// A `RuntimeError` passes through untouched; anything else keeps its
    /// message and is classified as [`UNKNOWN_REASON`].
    pub fn wrap(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<RuntimeError>() {
            Ok(runtime_error) => *runtime_error,
            Err(other) => Self::new(other.to_string(), UNKNOWN_REASON),
        }
    }

    /// Serialize as the JSON request body
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| {
            serde_json::json!({
                "errorMessage": self.error_message,
                "errorType": self.error_type,
                "stackTrace": [],
            })
            .to_string()
            .into_bytes()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_json_format() {
        let error = RuntimeError::new("boom", "Handler.Failed").with_stack_trace(["at main", "at run"]);

        let json: serde_json::Value = serde_json::from_slice(&error.to_json()).unwrap();
        assert_eq!(json["errorMessage"], "boom");
        assert_eq!(json["errorType"], "Handler.Failed");
        assert_eq!(json["stackTrace"], serde_json::json!(["at main", "at run"]));
    }

    #[test]
    fn test_empty_stack_trace_is_serialized() {
        let json = String::from_utf8(RuntimeError::new("boom", "X").to_json()).unwrap();
        assert_eq!(json, r#"{"errorMessage":"boom","errorType":"X","stackTrace":[]}"#);
    }

    #[test]
    fn test_wrap_passes_runtime_error_through() {
        let original = RuntimeError::new("typed", "Custom.Type").with_stack_trace(["frame"]);
        let wrapped = RuntimeError::wrap(Box::new(original.clone()));
        assert_eq!(wrapped, original);
    }

    #[test]
    fn test_wrap_classifies_foreign_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "Intentional error");
        let wrapped = RuntimeError::wrap(Box::new(io));
        assert_eq!(wrapped.error_message, "Intentional error");
        assert_eq!(wrapped.error_type, UNKNOWN_REASON);
        assert!(wrapped.stack_trace.is_empty());
    }

    #[test]
    fn test_display_is_message() {
        assert_eq!(RuntimeError::new("Intentional error", "X").to_string(), "Intentional error");
    }
}
