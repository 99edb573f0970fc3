//! Core types for runtimekit
//!
//! This crate provides the data model shared by the invocation loop, its
//! test doubles and the `bootstrap` binary.

pub mod context;
pub mod endpoints;
pub mod environment;
pub mod error;

pub use context::InvocationContext;
pub use endpoints::{headers, Endpoints};
pub use environment::RuntimeEnvironment;
pub use error::RuntimeError;
