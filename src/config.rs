//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file yields the stock
//! robot configuration running on the simulated byte source.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, RobofishError};
use crate::imu::setup::{BaudRate, OutputRate};
use crate::sbus::protocol::SBUS_CHANNEL_MASK;

/// Lowest forward speed step produced by the throttle mapping
pub const DEFAULT_SPEED_MIN: u8 = 2;

/// Highest forward speed step produced by the throttle mapping
pub const DEFAULT_SPEED_MAX: u8 = 10;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sbus: SbusConfig,
    #[serde(default)]
    pub imu: ImuConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub gait: GaitConfig,
    #[serde(default)]
    pub servo: ServoConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Where receive bytes come from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Real receiver and IMU on serial ports
    Serial,
    /// Synthetic SBUS and IMU streams
    #[default]
    Simulated,
}

/// Byte source selection
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
}

/// SBUS receiver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SbusConfig {
    #[serde(default = "default_sbus_port")]
    pub port: String,

    #[serde(default = "default_sbus_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,

    #[serde(default = "default_sbus_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_frame_timeout")]
    pub frame_timeout: u32,

    #[serde(default = "default_failsafe_timeout_ms")]
    pub failsafe_timeout_ms: u64,
}

/// IMU configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ImuConfig {
    #[serde(default = "default_imu_port")]
    pub port: String,

    #[serde(default = "default_imu_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,

    #[serde(default = "default_imu_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_frame_timeout")]
    pub frame_timeout: u32,

    /// Write the output rate register at start-up
    #[serde(default)]
    pub configure_on_start: bool,

    #[serde(default = "default_output_rate_hz")]
    pub output_rate_hz: u32,
}

/// Stick to command mapping
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MappingConfig {
    #[serde(default = "default_steering_neutral")]
    pub steering_neutral: u16,

    #[serde(default = "default_throttle_neutral")]
    pub throttle_neutral: u16,

    #[serde(default = "default_dead_zone")]
    pub dead_zone: u16,

    #[serde(default = "default_throttle_max")]
    pub throttle_max: u16,

    #[serde(default = "default_speed_min")]
    pub speed_min: u8,

    #[serde(default = "default_speed_max")]
    pub speed_max: u8,
}

/// Gait generator parameters
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GaitConfig {
    /// Control loop period
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Oscillation amplitude A in degrees
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,

    #[serde(default = "default_body_rest")]
    pub body_rest: f32,

    #[serde(default = "default_tail_rest")]
    pub tail_rest: f32,

    #[serde(default = "default_prepare_ms")]
    pub prepare_ms: u64,

    #[serde(default = "default_swing_blend_ms")]
    pub swing_blend_ms: u64,

    /// Phase counter increment per swing tick
    #[serde(default = "default_swing_step")]
    pub swing_step: u16,
}

/// Servo pulse range
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServoConfig {
    /// Pulse width at 0°, in timer counts
    #[serde(default = "default_min_pulse")]
    pub min_pulse: u16,

    /// Pulse width at 180°, in timer counts
    #[serde(default = "default_max_pulse")]
    pub max_pulse: u16,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_sbus_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_sbus_baud_rate() -> u32 { 100_000 }
fn default_ring_capacity() -> usize { 256 }
fn default_sbus_poll_interval_ms() -> u64 { 1 }
fn default_frame_timeout() -> u32 { 100 }
fn default_failsafe_timeout_ms() -> u64 { 100 }

fn default_imu_port() -> String { "/dev/ttyUSB1".to_string() }
fn default_imu_baud_rate() -> u32 { 115_200 }
fn default_imu_poll_interval_ms() -> u64 { 10 }
fn default_output_rate_hz() -> u32 { 100 }

fn default_steering_neutral() -> u16 { 874 }
fn default_throttle_neutral() -> u16 { 488 }
fn default_dead_zone() -> u16 { 50 }
fn default_throttle_max() -> u16 { 1208 }
fn default_speed_min() -> u8 { DEFAULT_SPEED_MIN }
fn default_speed_max() -> u8 { DEFAULT_SPEED_MAX }

fn default_tick_ms() -> u64 { 20 }
fn default_amplitude() -> f32 { 30.0 }
fn default_body_rest() -> f32 { 97.0 }
fn default_tail_rest() -> f32 { 90.0 }
fn default_prepare_ms() -> u64 { 700 }
fn default_swing_blend_ms() -> u64 { 200 }
fn default_swing_step() -> u16 { 4 }

fn default_min_pulse() -> u16 { 50 }
fn default_max_pulse() -> u16 { 250 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for SbusConfig {
    fn default() -> Self {
        Self {
            port: default_sbus_port(),
            baud_rate: default_sbus_baud_rate(),
            ring_capacity: default_ring_capacity(),
            poll_interval_ms: default_sbus_poll_interval_ms(),
            frame_timeout: default_frame_timeout(),
            failsafe_timeout_ms: default_failsafe_timeout_ms(),
        }
    }
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            port: default_imu_port(),
            baud_rate: default_imu_baud_rate(),
            ring_capacity: default_ring_capacity(),
            poll_interval_ms: default_imu_poll_interval_ms(),
            frame_timeout: default_frame_timeout(),
            configure_on_start: false,
            output_rate_hz: default_output_rate_hz(),
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            steering_neutral: default_steering_neutral(),
            throttle_neutral: default_throttle_neutral(),
            dead_zone: default_dead_zone(),
            throttle_max: default_throttle_max(),
            speed_min: default_speed_min(),
            speed_max: default_speed_max(),
        }
    }
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            amplitude: default_amplitude(),
            body_rest: default_body_rest(),
            tail_rest: default_tail_rest(),
            prepare_ms: default_prepare_ms(),
            swing_blend_ms: default_swing_blend_ms(),
            swing_step: default_swing_step(),
        }
    }
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min_pulse: default_min_pulse(),
            max_pulse: default_max_pulse(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> RobofishError {
    RobofishError::Config(toml::de::Error::custom(message))
}

fn check_range<T: PartialOrd + std::fmt::Display>(name: &str, value: T, min: T, max: T) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(format!("{} must be between {} and {}", name, min, max)));
    }
    Ok(())
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
    /// use robofish::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails
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
        // Ports only matter when reading real hardware
        if self.source.kind == SourceKind::Serial {
            if self.sbus.port.is_empty() {
                return Err(invalid("sbus port cannot be empty"));
            }
            if self.imu.port.is_empty() {
                return Err(invalid("imu port cannot be empty"));
            }
        }

        if self.sbus.baud_rate == 0 {
            return Err(invalid("sbus baud_rate must be greater than 0"));
        }

        if BaudRate::from_bps(self.imu.baud_rate).is_none() {
            return Err(invalid("imu baud_rate must be one of: 9600, 115200, 230400"));
        }

        if self.imu.configure_on_start && OutputRate::from_hz(self.imu.output_rate_hz).is_none() {
            return Err(invalid("imu output_rate_hz must be one of: 2, 5, 10, 50, 100, 200"));
        }

        // Ring buffers and polling
        check_range("sbus ring_capacity", self.sbus.ring_capacity, 64, 65536)?;
        check_range("imu ring_capacity", self.imu.ring_capacity, 64, 65536)?;
        check_range("sbus poll_interval_ms", self.sbus.poll_interval_ms, 1, 1000)?;
        check_range("imu poll_interval_ms", self.imu.poll_interval_ms, 1, 1000)?;
        check_range("sbus frame_timeout", self.sbus.frame_timeout, 1, 100_000)?;
        check_range("imu frame_timeout", self.imu.frame_timeout, 1, 100_000)?;
        check_range("failsafe_timeout_ms", self.sbus.failsafe_timeout_ms, 1, 60000)?;

        // Mapping
        let m = &self.mapping;
        for (name, value) in [
            ("steering_neutral", m.steering_neutral),
            ("throttle_neutral", m.throttle_neutral),
            ("throttle_max", m.throttle_max),
        ] {
            if value > SBUS_CHANNEL_MASK {
                return Err(invalid(format!("{} must not exceed {}", name, SBUS_CHANNEL_MASK)));
            }
        }

        if m.throttle_neutral >= m.throttle_max {
            return Err(invalid("throttle_neutral must be less than throttle_max"));
        }

        if m.throttle_neutral.saturating_add(m.dead_zone) >= m.throttle_max {
            return Err(invalid("dead_zone leaves no usable throttle range"));
        }

        if m.speed_min == 0 || m.speed_min > m.speed_max {
            return Err(invalid("speed_min must be between 1 and speed_max"));
        }

        // Gait
        let g = &self.gait;
        check_range("gait tick_ms", g.tick_ms, 1, 1000)?;
        check_range("amplitude", g.amplitude, 0.0, 60.0)?;
        check_range("body_rest", g.body_rest, 0.0, 180.0)?;
        check_range("tail_rest", g.tail_rest, 0.0, 180.0)?;
        check_range("prepare_ms", g.prepare_ms, 1, 10_000)?;
        check_range("swing_blend_ms", g.swing_blend_ms, 1, 10_000)?;
        check_range("swing_step", g.swing_step, 1, 314)?;

        // Servo
        if self.servo.min_pulse >= self.servo.max_pulse {
            return Err(invalid("servo min_pulse must be less than max_pulse"));
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        check_range("log_interval_ms", self.telemetry.log_interval_ms, 1, 60000)?;

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.source.kind, SourceKind::Simulated);
        assert_eq!(config.mapping.steering_neutral, 874);
        assert_eq!(config.mapping.throttle_neutral, 488);
        assert_eq!(config.gait.amplitude, 30.0);
        assert_eq!(config.sbus.failsafe_timeout_ms, 100);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.mapping, MappingConfig::default());
        assert_eq!(config.gait, GaitConfig::default());
        assert_eq!(config.servo, ServoConfig::default());
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.source.kind, SourceKind::Simulated);
        assert_eq!(config.mapping, MappingConfig::default());
        assert_eq!(config.gait, GaitConfig::default());
        assert_eq!(config.servo, ServoConfig::default());
        assert_eq!(config.imu.output_rate_hz, 100);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[source]
kind = "serial"

[sbus]
port = "/dev/ttyAMA0"

[imu]
port = "/dev/ttyAMA1"
configure_on_start = true
output_rate_hz = 50

[gait]
amplitude = 25.0
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.source.kind, SourceKind::Serial);
        assert_eq!(config.sbus.port, "/dev/ttyAMA0");
        assert_eq!(config.sbus.baud_rate, 100_000);
        assert_eq!(config.imu.output_rate_hz, 50);
        assert_eq!(config.gait.amplitude, 25.0);
        assert_eq!(config.gait.prepare_ms, 700);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load("/nonexistent/robofish.toml");
        assert!(matches!(result, Err(RobofishError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[gait\namplitude = 1");
        assert!(matches!(result, Err(RobofishError::Config(_))));
    }

    #[test]
    fn test_unknown_source_kind() {
        let result = Config::from_toml("[source]\nkind = \"bluetooth\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_port_only_rejected_for_serial() {
        let mut config = Config::default();
        config.sbus.port = String::new();
        assert!(config.validate().is_ok());

        config.source.kind = SourceKind::Serial;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_imu_baud_rate_must_be_supported() {
        let mut config = Config::default();
        config.imu.baud_rate = 57_600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_rate_checked_when_configuring() {
        let mut config = Config::default();
        config.imu.output_rate_hz = 20;
        assert!(config.validate().is_ok());

        config.imu.configure_on_start = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ring_capacity_too_small() {
        let mut config = Config::default();
        config.sbus.ring_capacity = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_zero() {
        let mut config = Config::default();
        config.imu.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failsafe_timeout_zero() {
        let mut config = Config::default();
        config.sbus.failsafe_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_throttle_range_inverted() {
        let mut config = Config::default();
        config.mapping.throttle_max = 400;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dead_zone_covers_range() {
        let mut config = Config::default();
        config.mapping.dead_zone = 720;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_value_above_mask() {
        let mut config = Config::default();
        config.mapping.steering_neutral = 2048;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_speed_range_inverted() {
        let mut config = Config::default();
        config.mapping.speed_min = 11;
        assert!(config.validate().is_err());

        config.mapping.speed_min = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_amplitude_out_of_range() {
        let mut config = Config::default();
        config.gait.amplitude = -1.0;
        assert!(config.validate().is_err());

        config.gait.amplitude = 61.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rest_angle_out_of_range() {
        let mut config = Config::default();
        config.gait.body_rest = 181.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_swing_step_zero() {
        let mut config = Config::default();
        config.gait.swing_step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_servo_pulse_range_inverted() {
        let mut config = Config::default();
        config.servo.min_pulse = 250;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());

        config.telemetry.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telemetry_limits() {
        let mut config = Config::default();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.log_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.telemetry.format = "csv".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jsonl"));
    }
}
