//! # SBUS Frame Encoder
//!
//! Packs RC channels into SBUS frames. Used by the simulated receiver.

use super::protocol::*;

/// Encode RC channels and flags into a complete 25-byte SBUS frame
///
/// # Examples
///
/// ```
/// use robofish::sbus::encoder::encode_frame;
///
/// let frame = encode_frame(&[1024u16; 16], 0);
/// assert_eq!(frame.len(), 25);
/// assert_eq!(frame[0], 0x0F);
/// assert_eq!(frame[24], 0x00);
/// ```
pub fn encode_frame(channels: &RcChannels, flags: u8) -> [u8; SBUS_FRAME_LENGTH] {
    let mut frame = [0u8; SBUS_FRAME_LENGTH];
    frame[0] = SBUS_START_BYTE;
    frame[1..=SBUS_PAYLOAD_SIZE].copy_from_slice(&encode_channels_payload(channels));
    frame[SBUS_FLAGS_INDEX] = flags;
    frame[SBUS_FRAME_LENGTH - 1] = SBUS_END_BYTE;
    frame
}

/// Pack 16 channels (11 bits each) into the 22-byte payload
///
/// Channels are packed as a continuous bitstream, LSB first:
/// ```text
/// Byte 0: Ch1[0:7]
/// Byte 1: Ch1[8:10] | Ch2[0:4]
/// Byte 2: Ch2[5:10] | Ch3[0:1]
/// ...
/// ```
pub fn encode_channels_payload(channels: &RcChannels) -> [u8; SBUS_PAYLOAD_SIZE] {
    let mut payload = [0u8; SBUS_PAYLOAD_SIZE];
    let mut accumulator: u32 = 0;
    let mut bits = 0;
    let mut index = 0;

    for &channel in channels.iter() {
        accumulator |= u32::from(channel & SBUS_CHANNEL_MASK) << bits;
        bits += SBUS_CHANNEL_BITS;

        while bits >= 8 {
            payload[index] = accumulator as u8;
            accumulator >>= 8;
            bits -= 8;
            index += 1;
        }
    }

    payload
}
