//! Error types for the invocation loop

use runtimekit_core::RuntimeError;
use thiserror::Error;

/// Classification for failures to fetch or read the next event
pub const GET_EVENT_ERROR: &str = "Initialize.GetEvent";

/// Classification for failures to post a handler result
pub const SEND_RESPONSE_ERROR: &str = "Invoke.SendResponse";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] http::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Which control-plane endpoint an error was escalated to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Setup or polling failure, reported to `/runtime/init/error`
    Initialization,
    /// Handler or response failure, reported to `/runtime/invocation/{id}/error`
    Invocation { request_id: String },
}

/// Error that terminated the invocation loop.
///
/// Displays as the triggering error. A failure to deliver the report
/// itself is kept alongside but never replaces the cause.
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct LoopError {
    class: ErrorClass,
    cause: RuntimeError,
    report_failure: Option<TransportError>,
}

impl LoopError {
    pub(crate) fn new(
        class: ErrorClass,
        cause: RuntimeError,
        report_failure: Option<TransportError>,
    ) -> Self {
        Self {
            class,
            cause,
            report_failure,
        }
    }

    pub fn class(&self) -> &ErrorClass {
        &self.class
    }

    /// The error that was reported to the control plane
    pub fn cause(&self) -> &RuntimeError {
        &self.cause
    }

    pub fn into_cause(self) -> RuntimeError {
        self.cause
    }

    /// Set when posting the error report failed
    pub fn report_failure(&self) -> Option<&TransportError> {
        self.report_failure.as_ref()
    }

    pub fn is_initialization(&self) -> bool {
        self.class == ErrorClass::Initialization
    }
}
