//! # marvin-core
//!
//! Shared library for marvin containing the packet framing codec, the
//! per-connection frame assembly state machine, and the motor command schema
//! carried inside frame bodies.
//!
//! This crate is used by both the server and the client.  It has zero
//! dependencies on sockets or OS APIs; everything here operates on byte
//! slices.
//!
//! # Architecture overview
//!
//! - **`protocol::header`** – The 3-byte packet header (`type`, `size`) and
//!   helpers for encoding whole frames and acknowledgements.
//!
//! - **`protocol::assembler`** – The `AwaitingHeader → AwaitingBody` state
//!   machine that turns exact-length byte chunks into complete frames.  The
//!   server drives one assembler per connection.
//!
//! - **`protocol::commands`** – The application payload schema (motor speed,
//!   motor settings, motor stop).  The framing layer never looks inside a
//!   body; this module is what gives `type` + body a meaning, and it can be
//!   swapped without touching the framing code.

pub mod protocol;

pub use protocol::assembler::{AssemblyState, FrameAssembler};
pub use protocol::commands::{Command, CommandId, MotorSettings, MotorSpeed};
pub use protocol::header::{
    decode_frame, encode_frame, Frame, PacketHeader, PacketId, ProtocolError, HEADER_SIZE,
};
