//! Application layer for the packet server.
//!
//! Handlers in this layer give frame bodies their meaning.  They implement
//! [`PacketHandler`](crate::infrastructure::network::PacketHandler) and are
//! injected into the receiver at construction; they never touch sockets.
//!
//! # Sub-modules
//!
//! - **`motor_control`** – Decodes motor commands and applies them to the
//!   motor state through a [`MotorDriver`](motor_control::MotorDriver).

pub mod motor_control;
