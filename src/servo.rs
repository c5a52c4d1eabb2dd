//! # Servo Output Module
//!
//! Converts gait angles into servo pulse widths.
//!
//! This module handles:
//! - Linear angle to pulse mapping over the configured pulse range
//! - The [`PulseOutput`] seam that a PWM backend implements
//! - A tracing-backed output for running without hardware

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ServoConfig;
use crate::error::Result;
use crate::gait::controller::{ServoAngles, ANGLE_MAX, ANGLE_MIN};

/// The two driven joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actuator {
    Body,
    Tail,
}

/// Map an angle in degrees to a pulse width.
///
/// The angle is clamped to `[0, 180]` and truncated to whole degrees, then
/// scaled with integer division, so the result always lies in
/// `[min_pulse, max_pulse]` and matches the firmware compare values.
///
/// # Examples
///
/// ```
/// use robofish::config::ServoConfig;
/// use robofish::servo::angle_to_pulse;
///
/// let config = ServoConfig::default();
/// assert_eq!(angle_to_pulse(0.0, &config), 50);
/// assert_eq!(angle_to_pulse(90.0, &config), 150);
/// assert_eq!(angle_to_pulse(250.0, &config), 250);
/// ```
#[must_use]
pub fn angle_to_pulse(angle: f32, config: &ServoConfig) -> u16 {
    let angle = if angle.is_nan() { ANGLE_MIN } else { angle.clamp(ANGLE_MIN, ANGLE_MAX) };
    let degrees = angle.trunc() as u32;
    let span = u32::from(config.max_pulse.saturating_sub(config.min_pulse));
    let offset = degrees * span / ANGLE_MAX as u32;
    config.min_pulse.saturating_add(offset as u16)
}

/// Sink for pulse widths; one call per actuator per control tick.
#[cfg_attr(test, mockall::automock)]
pub trait PulseOutput: Send {
    /// Set the compare value driving `actuator`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the write
    fn set_pulse(&mut self, actuator: Actuator, pulse: u16) -> Result<()>;
}

/// Output that only reports pulses through `tracing`.
#[derive(Debug, Default)]
pub struct LogOutput {
    last: Option<(u16, u16)>,
    body: u16,
}

impl PulseOutput for LogOutput {
    fn set_pulse(&mut self, actuator: Actuator, pulse: u16) -> Result<()> {
        match actuator {
            Actuator::Body => self.body = pulse,
            Actuator::Tail => {
                let pair = (self.body, pulse);
                if self.last != Some(pair) {
                    trace!("Servo pulses body={} tail={}", pair.0, pair.1);
                    self.last = Some(pair);
                }
            }
        }
        Ok(())
    }
}

/// Writes gait angles to a [`PulseOutput`].
pub struct ServoDriver<O: PulseOutput> {
    output: O,
    config: ServoConfig,
    writes: u64,
}

impl<O: PulseOutput> ServoDriver<O> {
    #[must_use]
    pub fn new(output: O, config: ServoConfig) -> Self {
        Self {
            output,
            config,
            writes: 0,
        }
    }

    /// Converts and writes both angles, body first.
    ///
    /// # Returns
    ///
    /// * `Result<(u16, u16)>` - The body and tail pulses written
    ///
    /// # Errors
    ///
    /// Returns the backend error; the tail is not written if the body fails
    pub fn write(&mut self, angles: ServoAngles) -> Result<(u16, u16)> {
        let body = angle_to_pulse(angles.body, &self.config);
        let tail = angle_to_pulse(angles.tail, &self.config);

        self.output.set_pulse(Actuator::Body, body)?;
        self.output.set_pulse(Actuator::Tail, tail)?;

        self.writes += 1;
        if self.writes == 1 {
            debug!("First servo write: body={} tail={}", body, tail);
        }
        Ok((body, tail))
    }

    /// Number of completed writes.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes
    }
}
