//! Infrastructure layer for the client application.
//!
//! # Sub-modules
//!
//! - **`network`** – Blocking TCP connection to the server: frame writes,
//!   acknowledgement reads, and connect retries with exponential backoff.

pub mod network;
