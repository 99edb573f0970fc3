//! Invocation loop for AWS Lambda custom runtimes
//!
//! Polls the Runtime API for events, hands each one to a [`Handler`] and
//! reports the result or a structured error back to the control plane.
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use runtimekit::{CustomRuntime, Handler, HandlerError, InvocationContext, InvocationOutput};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Handler for Echo {
//!     async fn invoke(
//!         &mut self,
//!         event: Bytes,
//!         _context: &InvocationContext,
//!     ) -> Result<InvocationOutput, HandlerError> {
//!         Ok(String::from_utf8(event.to_vec())?.into())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     if let Err(e) = CustomRuntime::from_env(Echo).run().await {
//!         eprintln!("{e}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod error;
pub mod handler;
pub mod output;
pub mod runtime;
pub mod transport;

pub use error::{ErrorClass, LoopError, TransportError};
pub use handler::{Handler, HandlerError};
pub use output::InvocationOutput;
pub use runtime::{CustomRuntime, LoopBound};
pub use transport::{HttpTransport, ResponseBody, Transport, TransportResponse};

pub use runtimekit_core::{InvocationContext, RuntimeEnvironment, RuntimeError};
