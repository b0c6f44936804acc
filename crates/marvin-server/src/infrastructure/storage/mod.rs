//! Storage infrastructure for the server application.
//!
//! # Sub-modules
//!
//! - **`config`** – Loads the TOML configuration file (`config.toml`) from the
//!   platform config directory or an explicit path, falling back to defaults
//!   when no file exists.

pub mod config;
