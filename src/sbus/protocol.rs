//! # SBUS Protocol Constants and Types
//!
//! Core wire definitions for the SBUS radio-control protocol.
//!
//! ## Frame Layout
//!
//! ```text
//! byte 0      0x0F start marker
//! bytes 1-22  16 channels x 11 bits, little-endian bit stream
//! byte 23     flags (bit 4 failsafe, bit 5 frame lost)
//! byte 24     0x00 end marker
//! ```

/// SBUS frame start byte
pub const SBUS_START_BYTE: u8 = 0x0F;

/// SBUS frame end byte
pub const SBUS_END_BYTE: u8 = 0x00;

/// Complete SBUS frame length in bytes
pub const SBUS_FRAME_LENGTH: usize = 25;

/// Packed channel payload size (16 channels x 11 bits = 176 bits = 22 bytes)
pub const SBUS_PAYLOAD_SIZE: usize = 22;

/// Offset of the flags byte within a frame
pub const SBUS_FLAGS_INDEX: usize = 23;

/// Number of RC channels
pub const SBUS_NUM_CHANNELS: usize = 16;

/// Bits per channel
pub const SBUS_CHANNEL_BITS: usize = 11;

/// Channel value mask (11-bit: 0-2047)
pub const SBUS_CHANNEL_MASK: u16 = 0x07FF;

/// Failsafe flag (receiver lost the transmitter)
pub const SBUS_FLAG_FAILSAFE: u8 = 0x10;

/// Frame lost flag (receiver dropped a frame)
pub const SBUS_FLAG_FRAME_LOST: u8 = 0x20;

/// RC channels array type (16 channels, 11-bit values)
pub type RcChannels = [u16; SBUS_NUM_CHANNELS];

/// Decoded content of one SBUS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbusPacket {
    /// Channel values, each masked to 11 bits.
    pub channels: RcChannels,

    /// Raw flags byte.
    pub flags: u8,

    /// Receiver reports loss of the transmitter link.
    pub failsafe: bool,

    /// Receiver reports a dropped frame.
    pub frame_lost: bool,
}

impl SbusPacket {
    /// Builds a packet from channels and a raw flags byte.
    #[must_use]
    pub fn new(channels: RcChannels, flags: u8) -> Self {
        Self {
            channels: channels.map(|c| c & SBUS_CHANNEL_MASK),
            flags,
            failsafe: flags & SBUS_FLAG_FAILSAFE != 0,
            frame_lost: flags & SBUS_FLAG_FRAME_LOST != 0,
        }
    }
}

/// Latest SBUS sample as seen by the rest of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFrame {
    /// Decoded frame content.
    pub packet: SbusPacket,

    /// Monotonic arrival time in milliseconds since start-up.
    pub received_at: u64,
}

impl ChannelFrame {
    /// Stamps a decoded packet with its arrival time.
    #[must_use]
    pub fn new(packet: SbusPacket, received_at: u64) -> Self {
        Self { packet, received_at }
    }

    /// Milliseconds elapsed between arrival and `now`.
    #[must_use]
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.received_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(SBUS_START_BYTE, 0x0F);
        assert_eq!(SBUS_END_BYTE, 0x00);
        assert_eq!(SBUS_FRAME_LENGTH, 25);
        assert_eq!(SBUS_PAYLOAD_SIZE * 8, SBUS_NUM_CHANNELS * SBUS_CHANNEL_BITS);
        assert_eq!(SBUS_FLAGS_INDEX, SBUS_FRAME_LENGTH - 2);
    }

    #[test]
    fn test_packet_flags() {
        let packet = SbusPacket::new([0; SBUS_NUM_CHANNELS], 0x30);
        assert!(packet.failsafe);
        assert!(packet.frame_lost);

        let packet = SbusPacket::new([0; SBUS_NUM_CHANNELS], 0x10);
        assert!(packet.failsafe);
        assert!(!packet.frame_lost);

        let packet = SbusPacket::new([0; SBUS_NUM_CHANNELS], 0x0F);
        assert!(!packet.failsafe);
        assert!(!packet.frame_lost);
    }

    #[test]
    fn test_packet_masks_channels() {
        let packet = SbusPacket::new([0xFFFF; SBUS_NUM_CHANNELS], 0);
        assert!(packet.channels.iter().all(|&c| c == 2047));
    }

    #[test]
    fn test_channel_frame_age() {
        let frame = ChannelFrame::new(SbusPacket::new([1024; SBUS_NUM_CHANNELS], 0), 500);
        assert_eq!(frame.age_ms(650), 150);
        assert_eq!(frame.age_ms(400), 0);
    }
}
