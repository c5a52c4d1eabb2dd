//! # IMU Setup Sequences
//!
//! Register write scripts for the JY901: baud rate, output rate, and the
//! accelerometer and gyroscope calibration routines.
//!
//! Every command is five bytes, `FF AA reg low high`. A script always unlocks
//! the register file first and saves it last. Some commands need the sensor to
//! settle before the next write, so each step carries its own delay.

use std::time::Duration;

use serde::de::Error as _;
use tracing::{debug, info};

use crate::error::{Result, RobofishError};
use crate::serial::port_trait::SerialPortIO;

/// First two bytes of every configuration command
pub const COMMAND_PREFIX: [u8; 2] = [0xFF, 0xAA];

/// Register addresses
pub mod registers {
    /// Save configuration
    pub const SAVE: u8 = 0x00;
    /// Calibration mode
    pub const CALSW: u8 = 0x01;
    /// Output rate
    pub const RRATE: u8 = 0x03;
    /// Baud rate
    pub const BAUD: u8 = 0x04;
    /// Gyroscope auto-calibration
    pub const GYRO_AUTO_CAL: u8 = 0x61;
    /// Unlock key register
    pub const KEY: u8 = 0x69;
}

/// Build a five byte register write
#[must_use]
pub const fn command(register: u8, low: u8, high: u8) -> [u8; 5] {
    [COMMAND_PREFIX[0], COMMAND_PREFIX[1], register, low, high]
}

/// Unlock key `FF AA 69 88 B5`
pub const UNLOCK: [u8; 5] = command(registers::KEY, 0x88, 0xB5);

/// Persist registers `FF AA 00 00 00`
pub const SAVE: [u8; 5] = command(registers::SAVE, 0x00, 0x00);

/// One write and the pause that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupStep {
    pub bytes: [u8; 5],
    pub settle: Duration,
}

impl SetupStep {
    const fn new(bytes: [u8; 5], settle_ms: u64) -> Self {
        Self {
            bytes,
            settle: Duration::from_millis(settle_ms),
        }
    }
}

/// Supported serial speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    B9600,
    B115200,
    B230400,
}

impl BaudRate {
    /// Register code for this speed.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::B9600 => 0x02,
            Self::B115200 => 0x06,
            Self::B230400 => 0x07,
        }
    }

    /// Parses a numeric baud rate.
    #[must_use]
    pub fn from_bps(bps: u32) -> Option<Self> {
        match bps {
            9600 => Some(Self::B9600),
            115_200 => Some(Self::B115200),
            230_400 => Some(Self::B230400),
            _ => None,
        }
    }
}

/// Supported output rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRate {
    Hz2,
    Hz5,
    Hz10,
    Hz50,
    Hz100,
    Hz200,
}

impl OutputRate {
    /// Register code for this rate.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Hz2 => 0x03,
            Self::Hz5 => 0x05,
            Self::Hz10 => 0x06,
            Self::Hz50 => 0x08,
            Self::Hz100 => 0x09,
            Self::Hz200 => 0x0B,
        }
    }

    /// Parses a rate in Hz.
    #[must_use]
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            2 => Some(Self::Hz2),
            5 => Some(Self::Hz5),
            10 => Some(Self::Hz10),
            50 => Some(Self::Hz50),
            100 => Some(Self::Hz100),
            200 => Some(Self::Hz200),
            _ => None,
        }
    }
}

fn wrap(commands: &[SetupStep]) -> Vec<SetupStep> {
    let mut steps = Vec::with_capacity(commands.len() + 2);
    steps.push(SetupStep::new(UNLOCK, 200));
    steps.extend_from_slice(commands);
    steps.push(SetupStep::new(SAVE, 0));
    steps
}

/// Script that changes the sensor baud rate.
#[must_use]
pub fn baud_rate_sequence(baud: BaudRate) -> Vec<SetupStep> {
    wrap(&[SetupStep::new(command(registers::BAUD, baud.code(), 0x00), 50)])
}

/// Script that changes the sensor output rate.
#[must_use]
pub fn output_rate_sequence(rate: OutputRate) -> Vec<SetupStep> {
    wrap(&[SetupStep::new(command(registers::RRATE, rate.code(), 0x00), 100)])
}

/// Accelerometer calibration: the sensor must lie flat and still for 4 s.
#[must_use]
pub fn accel_calibration_sequence() -> Vec<SetupStep> {
    wrap(&[
        SetupStep::new(command(registers::CALSW, 0x01, 0x00), 4000),
        SetupStep::new(command(registers::CALSW, 0x00, 0x00), 100),
    ])
}

/// Gyroscope calibration: the sensor must stay still for 3 s.
#[must_use]
pub fn gyro_calibration_sequence() -> Vec<SetupStep> {
    wrap(&[
        SetupStep::new(command(registers::GYRO_AUTO_CAL, 0x00, 0x00), 3000),
        SetupStep::new(command(registers::GYRO_AUTO_CAL, 0x01, 0x00), 100),
    ])
}

/// Writes a script to the port, sleeping after each step as required.
///
/// # Errors
///
/// Returns [`RobofishError::Serial`] if a write or flush fails; the remaining
/// steps are not sent.
pub async fn run_sequence<P: SerialPortIO + ?Sized>(port: &mut P, steps: &[SetupStep]) -> Result<()> {
    for step in steps {
        port.write_all(&step.bytes)
            .await
            .map_err(|e| RobofishError::Serial(format!("Failed to write IMU command: {}", e)))?;
        port.flush()
            .await
            .map_err(|e| RobofishError::Serial(format!("Failed to flush IMU command: {}", e)))?;

        debug!("IMU command {:02X?}", step.bytes);

        if !step.settle.is_zero() {
            tokio::time::sleep(step.settle).await;
        }
    }
    Ok(())
}

/// Sets the output rate named by `hz`.
///
/// # Errors
///
/// Returns a config error for unsupported rates, or a serial error on write
/// failure.
pub async fn configure_output_rate<P: SerialPortIO + ?Sized>(port: &mut P, hz: u32) -> Result<()> {
    let rate = OutputRate::from_hz(hz).ok_or_else(|| {
        RobofishError::Config(toml::de::Error::custom(format!(
            "unsupported IMU output rate {} Hz",
            hz
        )))
    })?;
    run_sequence(port, &output_rate_sequence(rate)).await?;
    info!("IMU output rate set to {} Hz", hz);
    Ok(())
}
