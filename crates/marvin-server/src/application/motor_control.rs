//! MotorCommandHandler: applies decoded motor commands to the motor state.
//!
//! Each frame is decoded into a [`Command`]; a frame that decodes is applied
//! and acknowledged with `true`, anything else (unknown type, wrong body size)
//! is acknowledged with `false` and leaves the state untouched.
//!
//! The handler also acts as a dead-man switch: when the last connected peer
//! goes away, or the server shuts down, the motors are stopped.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use marvin_core::{Command, MotorSettings, MotorSpeed, PacketHeader};
use tracing::{debug, info, warn};

use crate::infrastructure::network::{ConnectionId, DisconnectReason, PacketHandler};

/// Output side of the motor controller.
#[cfg_attr(test, mockall::automock)]
pub trait MotorDriver {
    /// Sets the signed speed of both drive motors.
    fn set_speed(&mut self, speed_left: i8, speed_right: i8);

    /// Sets the obstacle distance at which the motors stop.
    fn set_stop_distance(&mut self, stop_distance: u16);
}

/// A driver that only logs what it is told.  Used when no motor hardware is
/// attached.
#[derive(Debug, Default)]
pub struct TracingMotorDriver;

impl MotorDriver for TracingMotorDriver {
    fn set_speed(&mut self, speed_left: i8, speed_right: i8) {
        info!("motor speed set to left={speed_left} right={speed_right}");
    }

    fn set_stop_distance(&mut self, stop_distance: u16) {
        info!("motor stop distance set to {stop_distance}");
    }
}

/// Last applied motor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorState {
    pub speed_left: i8,
    pub speed_right: i8,
    pub stop_distance: u16,
}

impl MotorState {
    /// A stationary state with the given stop distance.
    pub fn new(stop_distance: u16) -> Self {
        Self {
            speed_left: 0,
            speed_right: 0,
            stop_distance,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.speed_left != 0 || self.speed_right != 0
    }
}

/// [`PacketHandler`] that drives the motors from client commands.
pub struct MotorCommandHandler<D: MotorDriver> {
    driver: D,
    state: MotorState,
    peers: BTreeMap<ConnectionId, SocketAddr>,
    frames_accepted: u64,
    frames_rejected: u64,
}

impl<D: MotorDriver> MotorCommandHandler<D> {
    /// Creates a handler with stationary motors.
    pub fn new(driver: D, stop_distance: u16) -> Self {
        Self {
            driver,
            state: MotorState::new(stop_distance),
            peers: BTreeMap::new(),
            frames_accepted: 0,
            frames_rejected: 0,
        }
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    /// Number of currently connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn frames_accepted(&self) -> u64 {
        self.frames_accepted
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Applies one command to the state and the driver.
    pub fn apply(&mut self, command: &Command) {
        match *command {
            Command::MotorSettings(MotorSettings { stop_distance }) => {
                self.state.stop_distance = stop_distance;
                self.driver.set_stop_distance(stop_distance);
            }
            Command::MotorSpeed(MotorSpeed {
                speed_left,
                speed_right,
            }) => {
                self.state.speed_left = speed_left;
                self.state.speed_right = speed_right;
                self.driver.set_speed(speed_left, speed_right);
            }
            Command::MotorStop => self.stop_motors(),
        }
    }

    fn stop_motors(&mut self) {
        self.state.speed_left = 0;
        self.state.speed_right = 0;
        self.driver.set_speed(0, 0);
    }
}

impl<D: MotorDriver> PacketHandler for MotorCommandHandler<D> {
    fn on_connect(&mut self, id: ConnectionId, addr: SocketAddr) {
        self.peers.insert(id, addr);
        info!("{id}: controller connected from {addr} ({} peer(s))", self.peers.len());
    }

    fn on_disconnect(&mut self, id: ConnectionId, addr: SocketAddr, reason: DisconnectReason) {
        self.peers.remove(&id);
        info!("{id}: controller {addr} disconnected ({reason})");
        if self.peers.is_empty() && self.state.is_moving() {
            info!("last controller gone, stopping motors");
            self.stop_motors();
        }
    }

    fn on_server_shutdown(&mut self) {
        info!(
            "motor handler shutting down after {} accepted / {} rejected frame(s)",
            self.frames_accepted, self.frames_rejected
        );
        if self.state.is_moving() {
            self.stop_motors();
        }
    }

    fn on_data(&mut self, id: ConnectionId, header: &PacketHeader, body: &[u8]) -> bool {
        match Command::decode(header, body) {
            Ok(command) => {
                debug!("{id}: {command:?}");
                self.apply(&command);
                self.frames_accepted += 1;
                true
            }
            Err(e) => {
                warn!("{id}: rejected frame: {e}");
                self.frames_rejected += 1;
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
