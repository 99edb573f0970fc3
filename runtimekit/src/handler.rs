//! Handler capability implemented by the embedder

use async_trait::async_trait;
use bytes::Bytes;
use runtimekit_core::{InvocationContext, RuntimeEnvironment};

use crate::output::InvocationOutput;

/// Error returned by handler code.
///
/// Returning a [`runtimekit_core::RuntimeError`] controls the reported
/// type and stack trace; any other error is reported with a generic type.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// User logic driven by [`crate::CustomRuntime`].
///
/// Calls are strictly sequential: `setup` once, `invoke` per event, and
/// `cleanup` once after a bounded loop finishes without error.
#[async_trait]
pub trait Handler: Send {
    /// Prepare before the first event
    async fn setup(&mut self, _env: &RuntimeEnvironment) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Process one event
    async fn invoke(
        &mut self,
        event: Bytes,
        context: &InvocationContext,
    ) -> Result<InvocationOutput, HandlerError>;

    async fn cleanup(&mut self, _env: &RuntimeEnvironment) {}
}
