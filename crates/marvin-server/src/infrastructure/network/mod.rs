//! Network infrastructure for the server application.
//!
//! # Sub-modules
//!
//! - **`handler`** – The [`PacketHandler`] callback trait the application
//!   implements, plus the [`ConnectionId`] and [`DisconnectReason`] types passed
//!   to it.
//!
//! - **`connection`** – Per-connection state: the socket, the frame assembler
//!   (header/body state machine) and the outbound acknowledgement queue.
//!
//! - **`receiver`** – The [`PacketReceiver`]: owns the listening socket and
//!   every connection, waits for readiness with `mio`, and runs one dispatch
//!   pass per call to [`PacketReceiver::poll`].

mod connection;
pub mod handler;
pub mod receiver;

pub use handler::{ConnectionId, DisconnectReason, PacketHandler};
pub use receiver::{PacketReceiver, ReceiverConfig, ReceiverError, ShutdownHandle};
