//! marvin packet server entry point.
//!
//! Wires the motor command handler into the packet receiver and drives the
//! receiver's poll loop on the main thread until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML file, then CLI/env overrides
//!  └─ PacketReceiver::bind()   -- listening socket + mio poller
//!  └─ ctrlc handler            -- ShutdownHandle::request() wakes the poll
//!  └─ poll loop                -- accept / read / dispatch / flush ACKs
//!  └─ PacketReceiver::shutdown()
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use marvin_server::application::motor_control::{MotorCommandHandler, TracingMotorDriver};
use marvin_server::infrastructure::network::PacketReceiver;
use marvin_server::infrastructure::storage::config::{load_config, save_config, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// marvin motor command server.
///
/// Every option overrides the matching value from the configuration file.
#[derive(Debug, Parser)]
#[command(
    name = "marvin-server",
    about = "Receives framed motor commands over TCP and acknowledges each one",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to `config.toml` in the platform config directory.  A missing
    /// file means built-in defaults.
    #[arg(long, env = "MARVIN_CONFIG")]
    config: Option<PathBuf>,

    /// Host name or IP address to listen on.
    #[arg(long, env = "MARVIN_HOST")]
    host: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "MARVIN_PORT")]
    port: Option<u16>,

    /// Listen backlog.
    #[arg(long, env = "MARVIN_BACKLOG")]
    backlog: Option<i32>,

    /// Upper bound on one readiness wait, in milliseconds.
    #[arg(long, env = "MARVIN_POLL_TIMEOUT_MS")]
    poll_timeout_ms: Option<u64>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, env = "MARVIN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write the effective configuration to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

impl Cli {
    /// Applies every option that was given on top of `config`.
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(backlog) = self.backlog {
            config.network.backlog = backlog;
        }
        if let Some(ms) = self.poll_timeout_ms {
            config.network.poll_timeout_ms = Some(ms);
        }
        if let Some(level) = &self.log_level {
            config.server.log_level = level.clone();
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_overrides(&mut config);

    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    if let Some(path) = &cli.write_config {
        save_config(path, &config)
            .with_context(|| format!("failed to write configuration to {}", path.display()))?;
        info!("configuration written to {}", path.display());
        return Ok(());
    }

    info!("marvin server starting");

    let receiver_config = config
        .to_receiver_config()
        .context("invalid network configuration")?;
    let handler = MotorCommandHandler::new(TracingMotorDriver, config.motor.stop_distance);
    let mut receiver =
        PacketReceiver::bind(receiver_config, handler).context("failed to start packet receiver")?;

    // ── Ctrl-C / SIGTERM handler ──────────────────────────────────────────────
    let shutdown = receiver.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        shutdown.request();
    })
    .context("failed to install Ctrl-C handler")?;

    info!(
        "marvin server ready on {}.  Press Ctrl-C to exit.",
        receiver.local_addr()
    );

    while !receiver.is_shutdown_requested() {
        receiver.poll().context("packet receiver poll failed")?;
    }

    receiver.shutdown();
    let handler = receiver.handler();
    info!(
        "marvin server stopped ({} frame(s) accepted, {} rejected)",
        handler.frames_accepted(),
        handler.frames_rejected()
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_options_keeps_file_values() {
        // Arrange
        let cli = Cli::parse_from(["marvin-server"]);
        let mut config = AppConfig::default();
        config.network.port = 7000;

        // Act
        cli.apply_overrides(&mut config);

        // Assert
        assert_eq!(config.network.port, 7000);
        assert_eq!(config.network.host, "0.0.0.0");
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["marvin-server", "--port", "9999"]);
        let mut config = AppConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.network.port, 9999);
    }

    #[test]
    fn test_cli_network_overrides() {
        let cli = Cli::parse_from([
            "marvin-server",
            "--host",
            "127.0.0.1",
            "--backlog",
            "64",
            "--poll-timeout-ms",
            "250",
        ]);
        let mut config = AppConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.network.host, "127.0.0.1");
        assert_eq!(config.network.backlog, 64);
        assert_eq!(config.network.poll_timeout_ms, Some(250));
    }

    #[test]
    fn test_cli_log_level_override() {
        let cli = Cli::parse_from(["marvin-server", "--log-level", "debug"]);
        let mut config = AppConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.server.log_level, "debug");
    }

    #[test]
    fn test_cli_config_path() {
        let cli = Cli::parse_from(["marvin-server", "--config", "/etc/marvin/config.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/marvin/config.toml")));
    }

    #[test]
    fn test_cli_rejects_out_of_range_port() {
        let result = Cli::try_parse_from(["marvin-server", "--port", "70000"]);
        assert!(result.is_err());
    }
}
