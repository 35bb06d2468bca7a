//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{FieldNodeError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub gps: GpsConfig,

    #[serde(default)]
    pub sensors: SensorConfig,

    #[serde(default)]
    pub payload: PayloadConfig,

    #[serde(default)]
    pub uplink: UplinkConfig,

    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GPS receiver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GpsConfig {
    /// Serial device; empty to auto-detect
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_gps_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default)]
    pub verify_checksum: bool,
}

/// Sensor sampling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    /// Delay between switching the white LED on and reading the colour sensor
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Uplink payload configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PayloadConfig {
    /// Prefix every uplink with the schema version byte
    #[serde(default)]
    pub schema_version_byte: bool,
}

/// Uplink scheduling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UplinkConfig {
    /// Send back-to-back as fast as the network allows instead of on a fixed period
    #[serde(default = "default_duty_cycle")]
    pub duty_cycle: bool,

    #[serde(default = "default_tx_interval_s")]
    pub tx_interval_s: u64,

    #[serde(default = "default_blocked_retry_delay_ms")]
    pub blocked_retry_delay_ms: u64,

    /// Consecutive transient failures retried before giving up; 0 retries forever
    #[serde(default = "default_transient_max_attempts")]
    pub transient_max_attempts: u32,

    #[serde(default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,

    #[serde(default = "default_transient_backoff_max_ms")]
    pub transient_backoff_max_ms: u64,

    #[serde(default = "default_app_port")]
    pub app_port: u8,

    #[serde(default = "default_confirmed_retries")]
    pub confirmed_retries: u8,

    #[serde(default = "default_adaptive_rate")]
    pub adaptive_rate: bool,
}

/// Over-the-air activation identity
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub dev_eui: [u8; 8],
    pub app_eui: [u8; 8],
    pub app_key: [u8; 16],

    #[serde(default = "default_join_trials")]
    pub join_trials: u8,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; empty logs to stdout only
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_gps_baud_rate() -> u32 { 9600 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_buffer_capacity() -> usize { crate::nmea::framer::DEFAULT_SENTENCE_CAPACITY }

fn default_settle_ms() -> u64 { 30 }

fn default_duty_cycle() -> bool { true }
fn default_tx_interval_s() -> u64 { 20 }
fn default_blocked_retry_delay_ms() -> u64 { 3000 }
fn default_transient_max_attempts() -> u32 { 8 }
fn default_transient_backoff_ms() -> u64 { 1000 }
fn default_transient_backoff_max_ms() -> u64 { 60000 }
fn default_app_port() -> u8 { 15 }
fn default_confirmed_retries() -> u8 { 3 }
fn default_adaptive_rate() -> bool { true }

fn default_join_trials() -> u8 { 3 }

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_gps_baud_rate(),
            poll_interval_ms: default_poll_interval_ms(),
            buffer_capacity: default_buffer_capacity(),
            verify_checksum: false,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            duty_cycle: default_duty_cycle(),
            tx_interval_s: default_tx_interval_s(),
            blocked_retry_delay_ms: default_blocked_retry_delay_ms(),
            transient_max_attempts: default_transient_max_attempts(),
            transient_backoff_ms: default_transient_backoff_ms(),
            transient_backoff_max_ms: default_transient_backoff_max_ms(),
            app_port: default_app_port(),
            confirmed_retries: default_confirmed_retries(),
            adaptive_rate: default_adaptive_rate(),
        }
    }
}

impl GpsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl SensorConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl UplinkConfig {
    pub fn tx_interval(&self) -> Duration {
        Duration::from_secs(self.tx_interval_s)
    }

    pub fn blocked_retry_delay(&self) -> Duration {
        Duration::from_millis(self.blocked_retry_delay_ms)
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_millis(self.transient_backoff_ms)
    }

    pub fn transient_backoff_max(&self) -> Duration {
        Duration::from_millis(self.transient_backoff_max_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
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
    /// use field_node::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Session identity is checked separately at join time (see
    /// [`crate::uplink::validate_identity`]) so a placeholder key fails startup
    /// as a fatal initialization error.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate GPS receiver
        if ![4800, 9600, 19200, 38400, 57600, 115200].contains(&self.gps.baud_rate) {
            return Err(invalid("gps baud_rate must be one of: 4800, 9600, 19200, 38400, 57600, 115200"));
        }

        if self.gps.poll_interval_ms == 0 || self.gps.poll_interval_ms > 60000 {
            return Err(invalid("poll_interval_ms must be between 1 and 60000"));
        }

        // Sentences are at most 82 characters; smaller buffers would drop every one
        if self.gps.buffer_capacity < 82 || self.gps.buffer_capacity > 4096 {
            return Err(invalid("buffer_capacity must be between 82 and 4096"));
        }

        if self.sensors.settle_ms > 1000 {
            return Err(invalid("settle_ms must be at most 1000"));
        }

        // Validate uplink timing
        if self.uplink.tx_interval_s == 0 || self.uplink.tx_interval_s > 86400 {
            return Err(invalid("tx_interval_s must be between 1 and 86400"));
        }

        if self.uplink.blocked_retry_delay_ms == 0 || self.uplink.blocked_retry_delay_ms > 600000 {
            return Err(invalid("blocked_retry_delay_ms must be between 1 and 600000"));
        }

        if self.uplink.transient_backoff_ms > self.uplink.transient_backoff_max_ms {
            return Err(invalid("transient_backoff_ms must not exceed transient_backoff_max_ms"));
        }

        // LoRaWAN application ports are 1-223
        if self.uplink.app_port == 0 || self.uplink.app_port > 223 {
            return Err(invalid("app_port must be between 1 and 223"));
        }

        if self.uplink.confirmed_retries == 0 || self.uplink.confirmed_retries > 8 {
            return Err(invalid("confirmed_retries must be between 1 and 8"));
        }

        if self.session.join_trials == 0 {
            return Err(invalid("join_trials must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> FieldNodeError {
    FieldNodeError::Config(toml::de::Error::custom(message))
}
