//! # IMU Frame Encoder
//!
//! Builds JY901 frames from raw field values. Used by the simulated sensor.

use super::protocol::*;

/// Encode four raw signed fields into a complete 11-byte frame
///
/// # Examples
///
/// ```
/// use robofish::imu::encoder::encode_frame;
/// use robofish::imu::protocol::ImuFrameType;
///
/// let frame = encode_frame(ImuFrameType::Gyro, [0, 0, 0, 0]);
/// assert_eq!(frame[0], 0x55);
/// assert_eq!(frame[1], 0x52);
/// assert_eq!(frame[10], 0xA7);
/// ```
pub fn encode_frame(frame_type: ImuFrameType, fields: [i16; 4]) -> [u8; IMU_FRAME_LENGTH] {
    let mut frame = [0u8; IMU_FRAME_LENGTH];
    frame[0] = IMU_FRAME_HEAD;
    frame[1] = frame_type.as_byte();

    for (i, field) in fields.iter().enumerate() {
        let [low, high] = field.to_le_bytes();
        frame[2 + i * 2] = low;
        frame[3 + i * 2] = high;
    }

    frame[IMU_FRAME_LENGTH - 1] = checksum(&frame[..IMU_FRAME_LENGTH - 1]);
    frame
}

/// Raw field value for an Euler angle in degrees
pub fn angle_to_raw(degrees: f32) -> i16 {
    (degrees / ANGLE_RANGE_DEG * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}
