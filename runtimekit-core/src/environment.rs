//! Runtime environment resolved from the Lambda execution environment

use serde::Serialize;

/// Variable holding the `host:port` of the Runtime API
pub const RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";

/// Variable holding the directory the function code was extracted to
pub const TASK_ROOT_VAR: &str = "LAMBDA_TASK_ROOT";

/// Variable holding the handler identifier from the function configuration
pub const HANDLER_VAR: &str = "_HANDLER";

/// Immutable snapshot of the configuration a custom runtime needs.
///
/// Resolved once when the runtime is constructed and never re-read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeEnvironment {
    /// Control-plane address (`host:port`, no scheme)
    pub runtime_api: String,
    /// Path to the function code
    pub task_root: String,
    /// Handler identifier, e.g. `function.handler`
    pub handler: String,
}

impl RuntimeEnvironment {
    pub fn new(
        runtime_api: impl Into<String>,
        task_root: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            runtime_api: runtime_api.into(),
            task_root: task_root.into(),
            handler: handler.into(),
        }
    }

    /// Read the environment from the current process.
    ///
    /// Unset or non-unicode variables resolve to an empty string.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the environment through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            runtime_api: lookup(RUNTIME_API_VAR).unwrap_or_default(),
            task_root: lookup(TASK_ROOT_VAR).unwrap_or_default(),
            handler: lookup(HANDLER_VAR).unwrap_or_default(),
        }
    }
}
