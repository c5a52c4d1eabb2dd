//! # IMU Protocol Constants and Types
//!
//! Wire definitions for the JY901 family inertial measurement unit.
//!
//! ## Frame Layout
//!
//! ```text
//! byte 0     0x55 head
//! byte 1     frame type
//! bytes 2-9  four signed 16-bit fields, low byte first
//! byte 10    checksum = (sum of bytes 0-9) & 0xFF
//! ```

use serde::Serialize;

/// Frame head byte
pub const IMU_FRAME_HEAD: u8 = 0x55;

/// Complete frame length in bytes (head + type + 8 data + checksum)
pub const IMU_FRAME_LENGTH: usize = 11;

/// Payload size in bytes
pub const IMU_PAYLOAD_SIZE: usize = 8;

/// Standard gravity in m/s²
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Accelerometer full scale in g
pub const ACCEL_RANGE_G: f32 = 16.0;

/// Gyroscope full scale in °/s
pub const GYRO_RANGE_DPS: f32 = 2000.0;

/// Euler angle full scale in °
pub const ANGLE_RANGE_DEG: f32 = 180.0;

/// Magnetometer LSB per µT
pub const MAGNET_LSB_PER_UT: f32 = 150.0;

/// Temperature LSB per °C
pub const TEMPERATURE_LSB_PER_C: f32 = 100.0;

/// Signed 16-bit full scale
const FULL_SCALE: f32 = 32768.0;

/// Frame type discriminator (byte 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImuFrameType {
    /// Acceleration + temperature
    Accel = 0x51,
    /// Angular rate
    Gyro = 0x52,
    /// Euler angles
    Angle = 0x53,
    /// Magnetic field
    Magnet = 0x54,
    /// Quaternion
    Quaternion = 0x59,
}

impl ImuFrameType {
    /// Parses a type byte; unknown types yield `None`.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x51 => Some(Self::Accel),
            0x52 => Some(Self::Gyro),
            0x53 => Some(Self::Angle),
            0x54 => Some(Self::Magnet),
            0x59 => Some(Self::Quaternion),
            _ => None,
        }
    }

    /// Wire value of this type.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One decoded frame, in physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImuFrame {
    /// Acceleration in m/s² and board temperature in °C
    Accel { accel: [f32; 3], temperature: f32 },
    /// Angular rate in °/s
    Gyro([f32; 3]),
    /// Roll, pitch, yaw in °
    Angle([f32; 3]),
    /// Magnetic field in µT
    Magnet([f32; 3]),
    /// Quaternion (w, x, y, z)
    Quaternion([f32; 4]),
}

/// Latest-value aggregate of every IMU frame type.
///
/// Each frame type refreshes only its own fields; fields never received keep
/// their previous value (zero at start-up).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ImuSample {
    /// Acceleration in m/s²
    pub accel: [f32; 3],
    /// Angular rate in °/s
    pub gyro: [f32; 3],
    /// Roll, pitch, yaw in °
    pub angle: [f32; 3],
    /// Magnetic field in µT
    pub magnet: [f32; 3],
    /// Quaternion (w, x, y, z)
    pub quaternion: [f32; 4],
    /// Temperature in °C
    pub temperature: f32,
}

impl ImuSample {
    /// Folds one frame into the aggregate.
    pub fn apply(&mut self, frame: &ImuFrame) {
        match *frame {
            ImuFrame::Accel { accel, temperature } => {
                self.accel = accel;
                self.temperature = temperature;
            }
            ImuFrame::Gyro(gyro) => self.gyro = gyro,
            ImuFrame::Angle(angle) => self.angle = angle,
            ImuFrame::Magnet(magnet) => self.magnet = magnet,
            ImuFrame::Quaternion(q) => self.quaternion = q,
        }
    }
}

/// Checksum over head, type and payload (bytes 0-9)
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Combine a low/high byte pair into a signed 16-bit value
#[inline]
pub fn combine(low: u8, high: u8) -> i16 {
    i16::from_le_bytes([low, high])
}

/// Convert an 8-byte payload of the given type into physical units
pub fn decode_payload(frame_type: ImuFrameType, payload: &[u8; IMU_PAYLOAD_SIZE]) -> ImuFrame {
    let raw: [f32; 4] = [
        f32::from(combine(payload[0], payload[1])),
        f32::from(combine(payload[2], payload[3])),
        f32::from(combine(payload[4], payload[5])),
        f32::from(combine(payload[6], payload[7])),
    ];
    let xyz = |scale: f32| [raw[0] * scale, raw[1] * scale, raw[2] * scale];

    match frame_type {
        ImuFrameType::Accel => ImuFrame::Accel {
            accel: xyz(ACCEL_RANGE_G * STANDARD_GRAVITY / FULL_SCALE),
            temperature: raw[3] / TEMPERATURE_LSB_PER_C,
        },
        ImuFrameType::Gyro => ImuFrame::Gyro(xyz(GYRO_RANGE_DPS / FULL_SCALE)),
        ImuFrameType::Angle => ImuFrame::Angle(xyz(ANGLE_RANGE_DEG / FULL_SCALE)),
        ImuFrameType::Magnet => ImuFrame::Magnet(xyz(1.0 / MAGNET_LSB_PER_UT)),
        ImuFrameType::Quaternion => ImuFrame::Quaternion(raw.map(|r| r / FULL_SCALE)),
    }
}
