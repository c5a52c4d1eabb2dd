//! # Control Task
//!
//! Once per control period:
//!
//! 1. Check the SBUS link; a stale or missing frame, or one carrying the
//!    receiver failsafe flag, forces Stop even mid-turn
//! 2. Otherwise map the newest frame to a command and hand it to the gait
//! 3. Tick the gait unconditionally
//! 4. Write both servo pulses

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::link::{LinkMonitor, LinkStatus};
use super::Clock;
use crate::error::Result;
use crate::gait::{GaitController, GaitSnapshot};
use crate::sbus::mapper::SbusCommandMapper;
use crate::sbus::protocol::ChannelFrame;
use crate::servo::{PulseOutput, ServoDriver};

/// What the control loop did on its latest tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlStatus {
    pub uptime_ms: u64,
    pub link: LinkStatus,
    pub gait: GaitSnapshot,
    pub body_pulse: u16,
    pub tail_pulse: u16,
}

/// Mapper, link monitor, gait and servo driver wired together.
pub struct ControlLoop<O: PulseOutput> {
    mapper: SbusCommandMapper,
    link: LinkMonitor,
    gait: GaitController,
    driver: ServoDriver<O>,
}

impl<O: PulseOutput> ControlLoop<O> {
    #[must_use]
    pub fn new(
        mapper: SbusCommandMapper,
        link: LinkMonitor,
        gait: GaitController,
        driver: ServoDriver<O>,
    ) -> Self {
        Self {
            mapper,
            link,
            gait,
            driver,
        }
    }

    #[must_use]
    pub fn gait(&self) -> &GaitController {
        &self.gait
    }

    /// Runs one control period.
    ///
    /// # Errors
    ///
    /// Returns the servo backend error; the gait has already advanced.
    pub fn step(&mut self, frame: Option<ChannelFrame>, now_ms: u64) -> Result<ControlStatus> {
        let link = self.link.check(frame.map(|f| f.received_at), now_ms);

        match (link, frame) {
            (LinkStatus::Up, Some(frame)) if !frame.packet.failsafe => {
                let command = self.mapper.map(&frame.packet);
                self.gait.apply_command(command);
            }
            // Receiver failsafe is treated exactly like a lost link
            _ => self.gait.force_stop(),
        }

        let angles = self.gait.tick(now_ms);
        let (body_pulse, tail_pulse) = self.driver.write(angles)?;

        Ok(ControlStatus {
            uptime_ms: now_ms,
            link,
            gait: self.gait.snapshot(),
            body_pulse,
            tail_pulse,
        })
    }
}

/// Runs the control loop every `tick_ms` until shutdown.
pub async fn run<O: PulseOutput>(
    mut control: ControlLoop<O>,
    tick_ms: u64,
    clock: Clock,
    frames: watch::Receiver<Option<ChannelFrame>>,
    status: watch::Sender<Option<ControlStatus>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Control task started, period {} ms", tick_ms);
    let mut ticker = interval(Duration::from_millis(tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = *frames.borrow();
                match control.step(frame, clock.now_ms()) {
                    Ok(current) => {
                        status.send_replace(Some(current));
                        last_error = None;
                    }
                    Err(e) => {
                        let message = e.to_string();
                        if last_error.as_deref() != Some(message.as_str()) {
                            warn!("Servo write failed: {}", message);
                        }
                        last_error = Some(message);
                    }
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    // Leave the fish at rest
    control.gait.force_stop();
    let now = clock.now_ms();
    if let Err(e) = control.driver.write(control.gait.tick(now)) {
        warn!("Failed to park servos: {}", e);
    }
    info!("Control task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GaitConfig, ServoConfig};
    use crate::gait::GaitMode;
    use crate::sbus::protocol::{SbusPacket, SBUS_FLAG_FAILSAFE, SBUS_NUM_CHANNELS};
    use crate::servo::{LogOutput, MockPulseOutput};

    fn control() -> ControlLoop<LogOutput> {
        ControlLoop::new(
            SbusCommandMapper::default(),
            LinkMonitor::new(100),
            GaitController::new(GaitConfig::default()),
            ServoDriver::new(LogOutput::default(), ServoConfig::default()),
        )
    }

    fn frame(steering: u16, throttle: u16, flags: u8, at: u64) -> ChannelFrame {
        let mut channels = [1024u16; SBUS_NUM_CHANNELS];
        channels[0] = steering;
        channels[2] = throttle;
        ChannelFrame::new(SbusPacket::new(channels, flags), at)
    }

    #[test]
    fn test_no_frame_holds_rest() {
        let mut control = control();
        let status = control.step(None, 0).unwrap();
        assert_eq!(status.link, LinkStatus::Lost);
        assert_eq!(status.gait.mode, GaitMode::Stop);
        // 97° and 90°
        assert_eq!((status.body_pulse, status.tail_pulse), (157, 150));
    }

    #[test]
    fn test_fresh_frame_drives_forward() {
        let mut control = control();
        let status = control.step(Some(frame(874, 848, 0, 0)), 10).unwrap();
        assert_eq!(status.link, LinkStatus::Up);
        assert_eq!(status.gait.mode, GaitMode::Forward);
        assert_eq!(status.gait.command.speed, 6);
    }

    #[test]
    fn test_stale_frame_forces_stop() {
        let mut control = control();
        let cruise = frame(874, 848, 0, 0);
        for now in 0..=100 {
            control.step(Some(cruise), now).unwrap();
        }
        assert_eq!(control.gait().mode(), GaitMode::Forward);

        let status = control.step(Some(cruise), 101).unwrap();
        assert_eq!(status.link, LinkStatus::Lost);
        assert_eq!(status.gait.mode, GaitMode::Stop);
    }

    #[test]
    fn test_link_loss_aborts_turn() {
        let mut control = control();
        let left = frame(700, 848, 0, 0);
        control.step(Some(left), 0).unwrap();
        assert_eq!(control.gait().mode(), GaitMode::TurnLeft);

        let status = control.step(Some(left), 500).unwrap();
        assert_eq!(status.gait.mode, GaitMode::Stop);
    }

    #[test]
    fn test_failsafe_flag_stops() {
        let mut control = control();
        control.step(Some(frame(874, 848, 0, 0)), 0).unwrap();
        let status = control
            .step(Some(frame(874, 848, SBUS_FLAG_FAILSAFE, 5)), 5)
            .unwrap();
        assert_eq!(status.link, LinkStatus::Up);
        assert_eq!(status.gait.mode, GaitMode::Stop);
    }

    #[test]
    fn test_failsafe_aborts_turn_same_tick() {
        let mut control = control();
        for now in 0..300 {
            control.step(Some(frame(1100, 848, 0, now)), now).unwrap();
            assert_eq!(control.gait().mode(), GaitMode::TurnRight, "t={}", now);
        }

        // Sticks still say turn, but the receiver reports failsafe
        let status = control
            .step(Some(frame(1100, 848, SBUS_FLAG_FAILSAFE, 300)), 300)
            .unwrap();
        assert_eq!(status.link, LinkStatus::Up);
        assert_eq!(status.gait.mode, GaitMode::Stop);
        assert_eq!((status.body_pulse, status.tail_pulse), (157, 150));

        for now in 301..1200 {
            let status = control
                .step(Some(frame(874, 848, SBUS_FLAG_FAILSAFE, now)), now)
                .unwrap();
            assert_eq!(status.gait.mode, GaitMode::Stop, "t={}", now);
        }
    }

    #[test]
    fn test_servo_error_propagates() {
        let mut output = MockPulseOutput::new();
        output
            .expect_set_pulse()
            .returning(|_, _| Err(crate::error::RobofishError::Serial("pwm".into())));

        let mut control = ControlLoop::new(
            SbusCommandMapper::default(),
            LinkMonitor::new(100),
            GaitController::new(GaitConfig::default()),
            ServoDriver::new(output, ServoConfig::default()),
        );
        assert!(control.step(None, 0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_publishes_status() {
        let clock = Clock::start();
        let (frames_tx, frames_rx) = watch::channel(None);
        let (status_tx, mut status_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(control(), 20, clock, frames_rx, status_tx, shutdown_rx));

        frames_tx.send_replace(Some(frame(874, 1208, 0, clock.now_ms())));
        tokio::time::sleep(Duration::from_millis(45)).await;
        status_rx.changed().await.unwrap();

        let status = status_rx.borrow().unwrap();
        assert_eq!(status.gait.mode, GaitMode::Forward);
        assert_eq!(status.gait.command.speed, 10);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
