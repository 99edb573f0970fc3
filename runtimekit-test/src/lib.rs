//! Test utilities for runtimekit
//!
//! Provides doubles for both collaborators of the invocation loop:
//! - [`MockTransport`]: scripted in-memory transport that records requests
//! - [`ControlPlane`]: a local Runtime API server for end-to-end tests
//! - [`FnHandler`]: a handler built from closures
//!
//! ## Usage
//!
//! ```rust,no_run
//! use runtimekit::{CustomRuntime, LoopBound, RuntimeEnvironment};
//! use runtimekit_test::{ControlPlane, FnHandler, QueuedEvent};
//!
//! #[tokio::test]
//! async fn test_echo() {
//!     let control_plane = ControlPlane::start().await.unwrap();
//!     control_plane.enqueue(QueuedEvent::new("hello"));
//!
//!     let env = RuntimeEnvironment::new(control_plane.runtime_api(), "/var/task", "echo");
//!     let handler = FnHandler::new(|event, _ctx| Ok(String::from_utf8(event.to_vec())?.into()));
//!     let mut runtime = CustomRuntime::new(handler, runtimekit::HttpTransport::new(), env)
//!         .with_loop_bound(LoopBound::Iterations(1));
//!
//!     runtime.run().await.unwrap();
//!     assert_eq!(control_plane.responses().await[0].body, "hello");
//! }
//! ```

pub mod control_plane;
pub mod handler;
pub mod transport;

pub use control_plane::{ControlPlane, QueuedEvent, RecordedError, RecordedResponse};
pub use handler::{FnHandler, HandlerCalls};
pub use transport::{MockTransport, RecordedRequest, Route};
