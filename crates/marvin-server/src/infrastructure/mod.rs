//! Infrastructure layer for the server application.
//!
//! Contains OS-facing adapters: the readiness-polling packet receiver and
//! file-system configuration storage.
//!
//! **Dependency rule**: this layer may depend on `marvin_core`, but MUST NOT
//! import anything from the `application` layer.  Application handlers plug
//! into the receiver through the [`network::PacketHandler`] trait.

pub mod network;
pub mod storage;
