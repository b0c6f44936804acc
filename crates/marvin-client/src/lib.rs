//! marvin-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The client is deliberately simple and blocking: connect (optionally with
//! bounded retries), write one frame, read its 3-byte acknowledgement.

/// Infrastructure layer: the TCP command connection and its retry policy.
pub mod infrastructure;

pub use infrastructure::network::{ClientError, CommandClient, RetryPolicy};
