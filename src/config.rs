//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::device::{DeviceInfo, DeviceKind};
use crate::error::{BridgeError, Result};
use crate::protocol::command::MAX_COMMAND_SIZE;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Command transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// State publisher configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PublisherConfig {
    #[serde(default = "default_publish_interval_ms")]
    pub interval_ms: u64,
}

/// Driving loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

/// Virtual device descriptor
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_device_kind")]
    pub kind: DeviceKind,

    #[serde(default = "default_body_color")]
    pub body_color: u32,

    #[serde(default = "default_buttons_color")]
    pub buttons_color: u32,

    #[serde(default = "default_battery_level")]
    pub battery_level: u8,
}

/// Diagnostics sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_diagnostics_enabled")]
    pub enabled: bool,

    #[serde(default = "default_diagnostics_path")]
    pub path: String,
}

/// Process logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub file: String,
}

// Default value functions
fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8910 }
fn default_max_datagram_size() -> usize { 64 }
fn default_max_consecutive_errors() -> u32 { 8 }
fn default_retry_backoff_ms() -> u64 { 100 }

fn default_publish_interval_ms() -> u64 { 20 }

fn default_tick_ms() -> u64 { 50 }

fn default_device_kind() -> DeviceKind { DeviceKind::ProController }
fn default_body_color() -> u32 { 0x2D2D2D }
fn default_buttons_color() -> u32 { 0xE6E6E6 }
fn default_battery_level() -> u8 { 4 }

fn default_diagnostics_enabled() -> bool { true }
fn default_diagnostics_path() -> String { "hidplus/log.txt".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_datagram_size: default_max_datagram_size(),
            max_consecutive_errors: default_max_consecutive_errors(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { interval_ms: default_publish_interval_ms() }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { tick_ms: default_tick_ms() }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: default_device_kind(),
            body_color: default_body_color(),
            buttons_color: default_buttons_color(),
            battery_level: default_battery_level(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: default_diagnostics_enabled(),
            path: default_diagnostics_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(msg))
}

impl NetworkConfig {
    /// Socket address the command transport binds to.
    ///
    /// # Errors
    ///
    /// Returns error if `bind_address` is not an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| invalid(format!("bind_address '{}' is not an IP address", self.bind_address)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl PublisherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ServiceConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl DeviceConfig {
    /// Registration descriptor for the virtual device.
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            kind: self.kind,
            body_color: self.body_color,
            buttons_color: self.buttons_color,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hidplus_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        self.network.socket_addr()?;

        if self.network.max_datagram_size <= MAX_COMMAND_SIZE || self.network.max_datagram_size > 65507 {
            return Err(invalid(format!(
                "max_datagram_size must be between {} and 65507",
                MAX_COMMAND_SIZE + 1
            )));
        }

        if self.network.max_consecutive_errors == 0 || self.network.max_consecutive_errors > 1000 {
            return Err(invalid("max_consecutive_errors must be between 1 and 1000"));
        }

        if self.network.retry_backoff_ms == 0 || self.network.retry_backoff_ms > 60000 {
            return Err(invalid("retry_backoff_ms must be between 1 and 60000"));
        }

        if self.publisher.interval_ms == 0 || self.publisher.interval_ms > 1000 {
            return Err(invalid("publisher interval_ms must be between 1 and 1000"));
        }

        if self.service.tick_ms == 0 || self.service.tick_ms > 60000 {
            return Err(invalid("tick_ms must be between 1 and 60000"));
        }

        for (name, value) in [
            ("body_color", self.device.body_color),
            ("buttons_color", self.device.buttons_color),
        ] {
            if value > 0xFF_FFFF {
                return Err(invalid(format!("{} must be a 0xRRGGBB value", name)));
            }
        }

        if self.device.battery_level > 4 {
            return Err(invalid("battery_level must be between 0 and 4"));
        }

        if self.diagnostics.enabled && self.diagnostics.path.is_empty() {
            return Err(invalid("diagnostics path cannot be empty when enabled"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}
