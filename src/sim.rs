//! # Simulated Byte Sources
//!
//! Synthetic SBUS and IMU producers so the control core runs on a development
//! host. Each producer writes complete wire frames into an [`RxRing`] on a fixed
//! period, exactly as the serial pumps do with real bytes.
//!
//! The radio replays a fixed stick script: idle, cruise, turn left, cruise,
//! turn right, then repeats.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::imu::encoder::{angle_to_raw, encode_frame};
use crate::imu::protocol::{ImuFrameType, ACCEL_RANGE_G, GYRO_RANGE_DPS, IMU_FRAME_LENGTH};
use crate::ring::RxRing;
use crate::sbus::encoder::encode_frame as encode_sbus_frame;
use crate::sbus::mapper::channels;
use crate::sbus::protocol::{RcChannels, SBUS_NUM_CHANNELS};

/// SBUS frame period in fast mode
pub const SBUS_FRAME_PERIOD: Duration = Duration::from_millis(7);

/// A stray byte is inserted before every Nth SBUS frame
const NOISE_EVERY_FRAMES: u64 = 50;

/// Untouched channels sit at mid-stick
const CHANNEL_CENTER: u16 = 1024;

/// Stick positions used by the script
const STEERING_CENTER: u16 = 874;
const STEERING_LEFT: u16 = 700;
const STEERING_RIGHT: u16 = 1050;
const THROTTLE_IDLE: u16 = 488;
const THROTTLE_CRUISE: u16 = 848;

/// One segment of the stick script.
#[derive(Debug, Clone, Copy)]
struct ScriptStep {
    duration_ms: u64,
    steering: u16,
    throttle: u16,
}

const SCRIPT: [ScriptStep; 5] = [
    ScriptStep { duration_ms: 2000, steering: STEERING_CENTER, throttle: THROTTLE_IDLE },
    ScriptStep { duration_ms: 5000, steering: STEERING_CENTER, throttle: THROTTLE_CRUISE },
    ScriptStep { duration_ms: 1500, steering: STEERING_LEFT, throttle: THROTTLE_CRUISE },
    ScriptStep { duration_ms: 3000, steering: STEERING_CENTER, throttle: THROTTLE_CRUISE },
    ScriptStep { duration_ms: 1500, steering: STEERING_RIGHT, throttle: THROTTLE_CRUISE },
];

fn script_length_ms() -> u64 {
    SCRIPT.iter().map(|s| s.duration_ms).sum()
}

/// Channel values the simulated radio sends `elapsed_ms` after start-up.
#[must_use]
pub fn radio_channels_at(elapsed_ms: u64) -> RcChannels {
    let mut offset = elapsed_ms % script_length_ms();
    let mut step = SCRIPT[0];
    for candidate in SCRIPT {
        step = candidate;
        if offset < candidate.duration_ms {
            break;
        }
        offset -= candidate.duration_ms;
    }

    let mut values = [CHANNEL_CENTER; SBUS_NUM_CHANNELS];
    values[channels::STEERING] = step.steering;
    values[channels::THROTTLE] = step.throttle;
    values
}

/// IMU frames the simulated sensor emits `elapsed_ms` after start-up:
/// acceleration, angular rate and attitude for a slowly yawing, rolling body.
#[must_use]
pub fn imu_frames_at(elapsed_ms: u64) -> [[u8; IMU_FRAME_LENGTH]; 3] {
    let t = elapsed_ms as f32 / 1000.0;

    let roll = 5.0 * (t * 2.0).sin();
    let yaw = ((t * 10.0 + 180.0) % 360.0) - 180.0;
    let roll_rate = 10.0 * (t * 2.0).cos();

    let one_g = (32768.0 / ACCEL_RANGE_G) as i16;
    let temperature = 2500;
    let accel = encode_frame(ImuFrameType::Accel, [0, 0, one_g, temperature]);

    let gyro_raw = |dps: f32| (dps / GYRO_RANGE_DPS * 32768.0).round() as i16;
    let gyro = encode_frame(ImuFrameType::Gyro, [gyro_raw(roll_rate), 0, gyro_raw(10.0), 0]);

    let angle = encode_frame(ImuFrameType::Angle, [angle_to_raw(roll), 0, angle_to_raw(yaw), 0]);

    [accel, gyro, angle]
}

/// Writes scripted SBUS frames into `ring` until shutdown.
pub async fn run_radio(ring: Arc<RxRing>, mut shutdown: watch::Receiver<bool>) {
    info!("Simulated SBUS radio started");
    let start = Instant::now();
    let mut ticker = interval(SBUS_FRAME_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if frames % NOISE_EVERY_FRAMES == NOISE_EVERY_FRAMES - 1 {
                    ring.push(&[0xA5]);
                }
                let elapsed = start.elapsed().as_millis() as u64;
                ring.push(&encode_sbus_frame(&radio_channels_at(elapsed), 0));
                frames += 1;
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Simulated SBUS radio stopped after {} frames", frames);
}

/// Writes IMU frames into `ring` at `rate_hz` until shutdown.
pub async fn run_imu(ring: Arc<RxRing>, rate_hz: u32, mut shutdown: watch::Receiver<bool>) {
    info!("Simulated IMU started at {} Hz", rate_hz);
    let start = Instant::now();
    let period = Duration::from_micros(1_000_000 / u64::from(rate_hz.max(1)));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let elapsed = start.elapsed().as_millis() as u64;
                for frame in imu_frames_at(elapsed) {
                    ring.push(&frame);
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Simulated IMU stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imu::decoder::ImuDecoder;
    use crate::imu::protocol::{ImuFrame, ImuSample, STANDARD_GRAVITY};
    use crate::ring::RingReader;
    use crate::sbus::decoder::SbusDecoder;
    use crate::sbus::mapper::{Action, SbusCommandMapper};
    use crate::sbus::protocol::SbusPacket;

    fn action_at(ms: u64) -> Action {
        SbusCommandMapper::default()
            .map(&SbusPacket::new(radio_channels_at(ms), 0))
            .action
    }

    #[test]
    fn test_script_actions() {
        assert_eq!(action_at(0), Action::Stop);
        assert_eq!(action_at(2500), Action::Forward);
        assert_eq!(action_at(7500), Action::TurnLeft);
        assert_eq!(action_at(9000), Action::Forward);
        assert_eq!(action_at(12_000), Action::TurnRight);
        // Script repeats
        assert_eq!(action_at(13_000), Action::Stop);
    }

    #[test]
    fn test_imu_frames_decode() {
        let mut decoder = ImuDecoder::new();
        let mut sample = ImuSample::default();
        for frame in imu_frames_at(1500) {
            for decoded in decoder.push_bytes(&frame) {
                sample.apply(&decoded);
            }
        }

        assert_eq!(decoder.stats().frames, 3);
        assert!((sample.accel[2] - STANDARD_GRAVITY).abs() < 0.01);
        assert!((sample.temperature - 25.0).abs() < 1e-3);
        assert!((sample.angle[2] - 15.0).abs() < 0.1);
        assert!((sample.gyro[2] - 10.0).abs() < 0.1);
    }

    #[test]
    fn test_imu_angle_frame_type() {
        let frames = imu_frames_at(0);
        let mut decoder = ImuDecoder::new();
        let decoded = decoder.push_bytes(&frames[2]);
        assert!(matches!(decoded[0], ImuFrame::Angle(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_radio_frames_survive_noise() {
        let ring = RxRing::shared(4096);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_radio(Arc::clone(&ring), rx));

        tokio::time::sleep(Duration::from_millis(7 * 60)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let mut bytes = Vec::new();
        RingReader::new(ring).drain_into(&mut bytes);

        let mut decoder = SbusDecoder::new();
        let packets = decoder.push_bytes(&bytes);
        assert!(packets.len() >= 55, "decoded {} frames", packets.len());
        assert!(packets.iter().all(|p| p.channels[channels::THROTTLE] == THROTTLE_IDLE));
    }
}
