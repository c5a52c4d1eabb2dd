//! # SBUS Frame Decoder
//!
//! Byte-at-a-time SBUS frame recovery.
//!
//! ## State Machine
//!
//! ```text
//! SeekStart --0x0F--> ReceivingBody --25 bytes--> SeekStart
//!                          |
//!                          +--timeout--> SeekStart (partial frame discarded)
//! ```
//!
//! The timeout counter advances for every byte consumed mid-frame and for every
//! idle poll reported through [`SbusDecoder::tick_idle`], so a frame that stalls
//! halfway never blocks resynchronisation.

use tracing::{debug, trace};

use super::protocol::*;

/// Default number of steps allowed mid-frame before the decoder resets.
pub const DEFAULT_FRAME_TIMEOUT: u32 = 100;

/// Decoder position within the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbusState {
    /// Discarding bytes until a start marker is seen.
    SeekStart,
    /// Collecting the remaining bytes of a frame.
    ReceivingBody,
}

/// Running decode counters, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SbusStats {
    /// Frames decoded successfully.
    pub frames: u64,
    /// Frames dropped because of a bad end marker.
    pub framing_errors: u64,
    /// Partial frames discarded by the timeout.
    pub timeouts: u64,
}

/// Streaming SBUS decoder.
///
/// # Examples
///
/// ```
/// use robofish::sbus::decoder::SbusDecoder;
/// use robofish::sbus::encoder::encode_frame;
///
/// let mut decoder = SbusDecoder::new();
/// let packets = decoder.push_bytes(&encode_frame(&[1000u16; 16], 0));
/// assert_eq!(packets.len(), 1);
/// assert_eq!(packets[0].channels[5], 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbusDecoder {
    state: SbusState,
    buffer: [u8; SBUS_FRAME_LENGTH],
    position: usize,
    timeout: u32,
    timeout_limit: u32,
    stats: SbusStats,
}

impl Default for SbusDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SbusDecoder {
    /// Creates a decoder with the default frame timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FRAME_TIMEOUT)
    }

    /// Creates a decoder that resets after `timeout_limit` mid-frame steps.
    #[must_use]
    pub fn with_timeout(timeout_limit: u32) -> Self {
        Self {
            state: SbusState::SeekStart,
            buffer: [0; SBUS_FRAME_LENGTH],
            position: 0,
            timeout: 0,
            timeout_limit,
            stats: SbusStats::default(),
        }
    }

    /// Current state machine position.
    #[must_use]
    pub fn state(&self) -> SbusState {
        self.state
    }

    /// Decode counters since creation.
    #[must_use]
    pub fn stats(&self) -> SbusStats {
        self.stats
    }

    /// Consumes one byte, returning a packet when it completes a valid frame.
    pub fn push_byte(&mut self, byte: u8) -> Option<SbusPacket> {
        if self.state == SbusState::ReceivingBody && self.step_timeout() {
            trace!("SBUS frame timed out after {} bytes", self.position);
        }

        match self.state {
            SbusState::SeekStart => {
                if byte == SBUS_START_BYTE {
                    self.buffer[0] = byte;
                    self.position = 1;
                    self.timeout = 0;
                    self.state = SbusState::ReceivingBody;
                }
                None
            }
            SbusState::ReceivingBody => {
                self.buffer[self.position] = byte;
                self.position += 1;

                if self.position < SBUS_FRAME_LENGTH {
                    return None;
                }

                let packet = self.finish_frame();
                self.reset();
                packet
            }
        }
    }

    /// Consumes a block of bytes, returning every packet completed, in order.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<SbusPacket> {
        bytes.iter().filter_map(|&b| self.push_byte(b)).collect()
    }

    /// Reports a poll that produced no bytes.
    ///
    /// Counts toward the mid-frame timeout so a stalled frame is eventually
    /// abandoned even when the line goes quiet.
    pub fn tick_idle(&mut self) {
        if self.state == SbusState::ReceivingBody && self.step_timeout() {
            debug!("SBUS receiver idle mid-frame, resynchronising");
        }
    }

    /// Advances the timeout counter; resets the decoder and returns true on expiry.
    fn step_timeout(&mut self) -> bool {
        self.timeout += 1;
        if self.timeout > self.timeout_limit {
            self.stats.timeouts += 1;
            self.reset();
            return true;
        }
        false
    }

    fn finish_frame(&mut self) -> Option<SbusPacket> {
        if self.buffer[SBUS_FRAME_LENGTH - 1] != SBUS_END_BYTE {
            self.stats.framing_errors += 1;
            debug!(
                "SBUS frame dropped: bad end byte 0x{:02X}",
                self.buffer[SBUS_FRAME_LENGTH - 1]
            );
            return None;
        }

        self.stats.frames += 1;
        Some(decode_frame(&self.buffer))
    }

    fn reset(&mut self) {
        self.state = SbusState::SeekStart;
        self.position = 0;
        self.timeout = 0;
    }
}

/// Decode a complete 25-byte frame whose markers are already validated
///
/// Channel *k* occupies bits `11k..11k+11` of the payload bit stream.
pub fn decode_frame(frame: &[u8; SBUS_FRAME_LENGTH]) -> SbusPacket {
    let mut payload = [0u8; SBUS_PAYLOAD_SIZE];
    payload.copy_from_slice(&frame[1..=SBUS_PAYLOAD_SIZE]);
    SbusPacket::new(decode_channels_payload(&payload), frame[SBUS_FLAGS_INDEX])
}

/// Unpack 16 eleven-bit channels from the 22-byte payload
pub fn decode_channels_payload(payload: &[u8; SBUS_PAYLOAD_SIZE]) -> RcChannels {
    let mut channels = [0u16; SBUS_NUM_CHANNELS];
    let mut accumulator: u32 = 0;
    let mut bits = 0;
    let mut channel = 0;

    for &byte in payload.iter() {
        accumulator |= u32::from(byte) << bits;
        bits += 8;

        while bits >= SBUS_CHANNEL_BITS && channel < SBUS_NUM_CHANNELS {
            channels[channel] = (accumulator as u16) & SBUS_CHANNEL_MASK;
            accumulator >>= SBUS_CHANNEL_BITS;
            bits -= SBUS_CHANNEL_BITS;
            channel += 1;
        }
    }

    channels
}
