//! TOML-based configuration for the packet server.
//!
//! The file is looked up at the platform-appropriate location unless a path
//! is given explicitly:
//! - Linux:    `~/.config/marvin/config.toml`
//! - macOS:    `~/Library/Application Support/marvin/config.toml`
//! - Windows:  `%APPDATA%\marvin\config.toml`
//!
//! ```toml
//! [server]
//! log_level = "debug"
//!
//! [network]
//! host = "0.0.0.0"
//! port = 4242
//! backlog = 10
//! poll_timeout_ms = 500
//!
//! [motor]
//! stop_distance = 20
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section and
//! a missing key all fall back to the built-in values.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::receiver::{
    ReceiverConfig, DEFAULT_BACKLOG, DEFAULT_EVENT_CAPACITY, DEFAULT_PORT,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `host:port` does not resolve to a socket address.
    #[error("invalid listen address {0}")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub motor: MotorSection,
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listening socket and poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// Host name or IP to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen backlog.
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    /// Upper bound on one readiness wait.  Absent means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_timeout_ms: Option<u64>,
    /// Readiness events collected per wait.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Initial motor controller settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorSection {
    /// Obstacle distance at which the motors stop, until a client changes it.
    #[serde(default = "default_stop_distance")]
    pub stop_distance: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_backlog() -> i32 {
    DEFAULT_BACKLOG
}
fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}
fn default_stop_distance() -> u16 {
    20
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            poll_timeout_ms: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for MotorSection {
    fn default() -> Self {
        Self {
            stop_distance: default_stop_distance(),
        }
    }
}

impl NetworkSection {
    /// Resolves `host:port` to the first matching socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] when the pair does not resolve.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let target = format!("{}:{}", self.host, self.port);
        target
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(ConfigError::InvalidAddress(target))
    }
}

impl AppConfig {
    /// Builds the receiver configuration from the `[network]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] when `host:port` does not resolve.
    pub fn to_receiver_config(&self) -> Result<ReceiverConfig, ConfigError> {
        Ok(ReceiverConfig {
            bind_addr: self.network.bind_addr()?,
            backlog: self.network.backlog,
            poll_timeout: self.network.poll_timeout_ms.map(Duration::from_millis),
            event_capacity: self.network.event_capacity,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads `AppConfig` from `path`, or from [`config_file_path`] when `None`.
///
/// A missing file yields `AppConfig::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("marvin"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("marvin"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("marvin")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("marvin_test_{tag}_{}", std::process::id()))
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_network_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.network.host, "0.0.0.0");
        assert_eq!(cfg.network.port, 4242);
        assert_eq!(cfg.network.backlog, 10);
        assert_eq!(cfg.network.poll_timeout_ms, None);
    }

    #[test]
    fn test_server_section_default_log_level_is_info() {
        assert_eq!(ServerSection::default().log_level, "info");
    }

    // ── TOML parsing ──────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_network_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[network]
port = 9999
poll_timeout_ms = 250
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.network.port, 9999);
        assert_eq!(cfg.network.poll_timeout_ms, Some(250));
        // Unspecified fields keep their defaults
        assert_eq!(cfg.network.backlog, 10);
        assert_eq!(cfg.motor.stop_distance, 20);
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_round_trip_omits_absent_poll_timeout() {
        let cfg = AppConfig::default();

        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        assert!(!toml_str.contains("poll_timeout_ms"));
        assert_eq!(cfg, restored);
    }

    // ── Receiver config ───────────────────────────────────────────────────────

    #[test]
    fn test_to_receiver_config_maps_network_section() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.network.host = "127.0.0.1".to_string();
        cfg.network.port = 5000;
        cfg.network.backlog = 32;
        cfg.network.poll_timeout_ms = Some(100);

        // Act
        let rc = cfg.to_receiver_config().expect("receiver config");

        // Assert
        assert_eq!(rc.bind_addr, "127.0.0.1:5000".parse().unwrap());
        assert_eq!(rc.backlog, 32);
        assert_eq!(rc.poll_timeout, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_unresolvable_host_is_invalid_address() {
        let mut cfg = AppConfig::default();
        cfg.network.host = "not a host name".to_string();

        let result = cfg.to_receiver_config();

        assert!(matches!(result, Err(ConfigError::InvalidAddress(_))));
    }

    // ── load / save ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config(Some(&path)).expect("missing file is not an error");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip() {
        // Arrange
        let dir = temp_dir("roundtrip");
        let path = dir.join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.network.port = 12345;
        cfg.server.log_level = "debug".to_string();

        // Act
        save_config(&path, &cfg).expect("save");
        let loaded = load_config(Some(&path)).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_malformed_file_is_parse_error() {
        let dir = temp_dir("malformed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[network]\nport = \"not a number\"\n").unwrap();

        let result = load_config(Some(&path));

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("marvin/config.toml"),
                "unexpected config path {path:?}"
            );
        }
        // NoPlatformConfigDir is acceptable in a stripped environment.
    }
}
