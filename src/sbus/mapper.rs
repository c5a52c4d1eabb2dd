//! # SBUS Command Mapper
//!
//! Maps the latest SBUS channels to a discrete drive [`Command`].
//!
//! ## Channel Assignments
//!
//! | Channel | Stick | Function |
//! |---------|-------|----------|
//! | CH1 (index 0) | Right stick X | Steering |
//! | CH3 (index 2) | Left stick Y | Throttle / speed |
//!
//! ## Decision Table
//!
//! | Failsafe | Throttle | Steering | Command |
//! |----------|----------|----------|---------|
//! | set | any | any | Stop |
//! | clear | ≤ neutral + dead zone | any | Stop |
//! | clear | above | < neutral − dead zone | TurnLeft |
//! | clear | above | > neutral + dead zone | TurnRight |
//! | clear | above | centered | Forward |
//!
//! Speed is computed whenever throttle is above the dead zone, including turns.

use super::protocol::SbusPacket;
use crate::config::MappingConfig;

/// Channel indices for semantic access.
pub mod channels {
    /// Steering - Right Stick X
    pub const STEERING: usize = 0;
    /// Throttle - Left Stick Y
    pub const THROTTLE: usize = 2;
}

/// High-level motion requested by the pilot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Hold both servos at rest.
    #[default]
    Stop,
    /// Swim straight ahead.
    Forward,
    /// Perform one left turn.
    TurnLeft,
    /// Perform one right turn.
    TurnRight,
}

/// Drive command with its attached speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Command {
    /// Requested motion.
    pub action: Action,
    /// Oscillator step per control tick (2-10); only Forward uses it.
    pub speed: u8,
}

impl Command {
    /// A stop command carrying the minimum speed.
    #[must_use]
    pub fn stop() -> Self {
        Self {
            action: Action::Stop,
            speed: crate::config::DEFAULT_SPEED_MIN,
        }
    }

    /// A forward command at `speed`.
    #[must_use]
    pub fn forward(speed: u8) -> Self {
        Self {
            action: Action::Forward,
            speed,
        }
    }

    /// A turn command; `speed` is carried for the forward phase that may follow.
    #[must_use]
    pub fn turn(action: Action, speed: u8) -> Self {
        Self { action, speed }
    }
}

impl Default for Command {
    fn default() -> Self {
        Self::stop()
    }
}

/// Maps SBUS packets to drive commands.
///
/// # Examples
///
/// ```
/// use robofish::config::MappingConfig;
/// use robofish::sbus::mapper::{Action, SbusCommandMapper};
/// use robofish::sbus::protocol::SbusPacket;
///
/// let mapper = SbusCommandMapper::new(MappingConfig::default());
///
/// let mut channels = [0u16; 16];
/// channels[0] = 874; // steering centered
/// channels[2] = 848; // throttle up
///
/// let command = mapper.map(&SbusPacket::new(channels, 0));
/// assert_eq!(command.action, Action::Forward);
/// assert_eq!(command.speed, 6);
/// ```
#[derive(Debug, Clone)]
pub struct SbusCommandMapper {
    config: MappingConfig,
}

impl Default for SbusCommandMapper {
    fn default() -> Self {
        Self::new(MappingConfig::default())
    }
}

impl SbusCommandMapper {
    /// Creates a mapper with the given neutral points and ranges.
    #[must_use]
    pub fn new(config: MappingConfig) -> Self {
        Self { config }
    }

    /// Maps one packet to a command.
    #[must_use]
    pub fn map(&self, packet: &SbusPacket) -> Command {
        if packet.failsafe {
            return Command::stop();
        }

        let cfg = &self.config;
        let steering = packet.channels[channels::STEERING];
        let throttle = packet.channels[channels::THROTTLE];

        if throttle <= cfg.throttle_neutral.saturating_add(cfg.dead_zone) {
            return Command::stop();
        }

        let speed = self.speed_for_throttle(throttle);

        if steering < cfg.steering_neutral.saturating_sub(cfg.dead_zone) {
            Command::turn(Action::TurnLeft, speed)
        } else if steering > cfg.steering_neutral.saturating_add(cfg.dead_zone) {
            Command::turn(Action::TurnRight, speed)
        } else {
            Command::forward(speed)
        }
    }

    /// Linear throttle to speed mapping, rounded to the nearest step.
    ///
    /// Throttle is clamped to `[throttle_neutral, throttle_max]` first, so
    /// anything at or below neutral maps to `speed_min`.
    #[must_use]
    pub fn speed_for_throttle(&self, throttle: u16) -> u8 {
        let cfg = &self.config;
        let clamped = throttle.clamp(cfg.throttle_neutral, cfg.throttle_max);
        let span = f32::from(cfg.throttle_max - cfg.throttle_neutral);
        let speed_range = f32::from(cfg.speed_max - cfg.speed_min);

        let mapped = f32::from(cfg.speed_min)
            + f32::from(clamped - cfg.throttle_neutral) * speed_range / span;

        mapped.round() as u8
    }
}
