//! marvin command client entry point.
//!
//! Sends one motor command (or a raw frame) to a marvin server and reports
//! whether the server acknowledged it as handled.
//!
//! ```text
//! marvin-client speed 40 -40
//! marvin-client settings 25
//! marvin-client stop
//! marvin-client raw 0x03 05fa
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use marvin_client::{CommandClient, RetryPolicy};
use marvin_core::{Command, MotorSettings, MotorSpeed};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// marvin motor command client.
#[derive(Debug, Parser)]
#[command(
    name = "marvin-client",
    about = "Sends framed motor commands to a marvin server",
    version
)]
struct Cli {
    /// Host name or IP address of the server.
    #[arg(long, default_value = "127.0.0.1", env = "MARVIN_HOST")]
    host: String,

    /// TCP port of the server.
    #[arg(long, default_value_t = 4242, env = "MARVIN_PORT")]
    port: u16,

    /// Connect attempts before giving up.
    #[arg(long, default_value_t = 5)]
    attempts: u32,

    /// Overall connect deadline in seconds.
    #[arg(long, default_value_t = 10)]
    deadline_secs: u64,

    /// Seconds to wait for the acknowledgement.
    #[arg(long, default_value_t = 5)]
    ack_timeout_secs: u64,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Set the speed of both drive motors (-128..=127).
    Speed {
        #[arg(allow_negative_numbers = true)]
        left: i8,
        #[arg(allow_negative_numbers = true)]
        right: i8,
    },
    /// Set the obstacle distance at which the motors stop.
    Settings { stop_distance: u16 },
    /// Stop both motors.
    Stop,
    /// Send an arbitrary frame.
    Raw {
        /// Packet type, decimal or `0x`-prefixed hex.
        #[arg(value_parser = parse_packet_type)]
        packet_type: u8,
        /// Body as hex digits, e.g. `05fa`.
        #[arg(value_parser = parse_hex_body)]
        body: Option<HexBody>,
    },
}

/// Frame body given on the command line as hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HexBody(Vec<u8>);

impl Cli {
    fn server_addr(&self) -> anyhow::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("cannot resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("{}:{} resolved to no address", self.host, self.port))
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.attempts,
            deadline: Duration::from_secs(self.deadline_secs),
            ..RetryPolicy::default()
        }
    }
}

fn parse_packet_type(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid packet type '{s}': {e}"))
}

fn parse_hex_body(s: &str) -> Result<HexBody, String> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(format!("hex body '{s}' has an odd number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("invalid hex byte '{}': {e}", &digits[i..i + 2]))
        })
        .collect::<Result<Vec<u8>, String>>()
        .map(HexBody)
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let addr = cli.server_addr()?;

    let mut client = CommandClient::connect_with_retry(addr, &cli.retry_policy())
        .with_context(|| format!("could not reach marvin server at {addr}"))?;
    client.set_ack_timeout(Some(Duration::from_secs(cli.ack_timeout_secs)))?;

    let handled = match &cli.action {
        Action::Speed { left, right } => client.send_command(&Command::MotorSpeed(MotorSpeed {
            speed_left: *left,
            speed_right: *right,
        })),
        Action::Settings { stop_distance } => {
            client.send_command(&Command::MotorSettings(MotorSettings {
                stop_distance: *stop_distance,
            }))
        }
        Action::Stop => client.send_command(&Command::MotorStop),
        Action::Raw { packet_type, body } => {
            let body = body.as_ref().map_or(&[][..], |b| b.0.as_slice());
            client.request(*packet_type, body)
        }
    }
    .context("command failed")?;

    if !handled {
        bail!("server rejected the command");
    }
    info!("server acknowledged the command");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["marvin-client", "stop"]);
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 4242);
        assert!(matches!(cli.action, Action::Stop));
    }

    #[test]
    fn test_speed_accepts_negative_values() {
        let cli = Cli::parse_from(["marvin-client", "speed", "-40", "127"]);
        match cli.action {
            Action::Speed { left, right } => {
                assert_eq!(left, -40);
                assert_eq!(right, 127);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_speed_out_of_range_is_rejected() {
        let result = Cli::try_parse_from(["marvin-client", "speed", "200", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_parses_stop_distance() {
        let cli = Cli::parse_from(["marvin-client", "settings", "300"]);
        assert!(matches!(cli.action, Action::Settings { stop_distance: 300 }));
    }

    #[test]
    fn test_raw_parses_hex_type_and_body() {
        let cli = Cli::parse_from(["marvin-client", "raw", "0x03", "05fa"]);
        match cli.action {
            Action::Raw { packet_type, body } => {
                assert_eq!(packet_type, 3);
                assert_eq!(body, Some(HexBody(vec![0x05, 0xFA])));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_raw_without_body() {
        let cli = Cli::parse_from(["marvin-client", "raw", "4"]);
        assert!(matches!(cli.action, Action::Raw { packet_type: 4, body: None }));
    }

    #[test]
    fn test_parse_hex_body_rejects_odd_length() {
        assert!(parse_hex_body("abc").is_err());
        assert!(parse_hex_body("zz").is_err());
        assert_eq!(parse_hex_body("").unwrap(), HexBody(Vec::new()));
    }

    #[test]
    fn test_retry_policy_uses_cli_values() {
        let cli = Cli::parse_from(["marvin-client", "--attempts", "2", "--deadline-secs", "3", "stop"]);
        let policy = cli.retry_policy();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.deadline, Duration::from_secs(3));
    }

    #[test]
    fn test_server_addr_resolves_loopback() {
        let cli = Cli::parse_from(["marvin-client", "--port", "5000", "stop"]);
        assert_eq!(cli.server_addr().unwrap(), "127.0.0.1:5000".parse().unwrap());
    }
}
