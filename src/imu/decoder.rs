//! # IMU Frame Decoder
//!
//! Checksum-gated recovery of JY901 frames from a raw byte stream.
//!
//! ## State Machine
//!
//! ```text
//! SeekHead --0x55--> SeekType --known type--> ReceiveData --9 bytes--> SeekHead
//!                       |                          |
//!                       +--unknown type--> SeekHead +--timeout--> SeekHead
//! ```

use tracing::{debug, trace};

use super::protocol::*;

/// Default number of steps allowed mid-frame before the decoder resets.
pub const DEFAULT_FRAME_TIMEOUT: u32 = 100;

/// Decoder position within the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImuState {
    /// Waiting for the 0x55 head byte.
    SeekHead,
    /// Head seen; next byte must be a known frame type.
    SeekType,
    /// Collecting payload and checksum.
    ReceiveData,
}

/// Running decode counters, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImuStats {
    /// Frames that passed the checksum.
    pub frames: u64,
    /// Head bytes followed by an unknown type.
    pub framing_errors: u64,
    /// Complete frames whose checksum did not match.
    pub checksum_errors: u64,
    /// Partial frames discarded by the timeout.
    pub timeouts: u64,
}

/// Streaming IMU decoder.
///
/// # Examples
///
/// ```
/// use robofish::imu::decoder::ImuDecoder;
/// use robofish::imu::encoder::encode_frame;
/// use robofish::imu::protocol::{ImuFrame, ImuFrameType};
///
/// let mut decoder = ImuDecoder::new();
/// let frames = decoder.push_bytes(&encode_frame(ImuFrameType::Angle, [16384, 0, 0, 0]));
/// assert!(matches!(frames[0], ImuFrame::Angle(a) if (a[0] - 90.0).abs() < 0.01));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImuDecoder {
    state: ImuState,
    buffer: [u8; IMU_FRAME_LENGTH],
    position: usize,
    checksum: u8,
    timeout: u32,
    timeout_limit: u32,
    stats: ImuStats,
}

impl Default for ImuDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImuDecoder {
    /// Creates a decoder with the default frame timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FRAME_TIMEOUT)
    }

    /// Creates a decoder that resets after `timeout_limit` mid-frame steps.
    #[must_use]
    pub fn with_timeout(timeout_limit: u32) -> Self {
        Self {
            state: ImuState::SeekHead,
            buffer: [0; IMU_FRAME_LENGTH],
            position: 0,
            checksum: 0,
            timeout: 0,
            timeout_limit,
            stats: ImuStats::default(),
        }
    }

    /// Current state machine position.
    #[must_use]
    pub fn state(&self) -> ImuState {
        self.state
    }

    /// Decode counters since creation.
    #[must_use]
    pub fn stats(&self) -> ImuStats {
        self.stats
    }

    /// Consumes one byte, returning a frame when it completes a valid one.
    pub fn push_byte(&mut self, byte: u8) -> Option<ImuFrame> {
        if self.state != ImuState::SeekHead && self.step_timeout() {
            trace!("IMU frame timed out after {} bytes", self.position);
        }

        match self.state {
            ImuState::SeekHead => {
                if byte == IMU_FRAME_HEAD {
                    self.buffer[0] = byte;
                    self.position = 1;
                    self.checksum = byte;
                    self.timeout = 0;
                    self.state = ImuState::SeekType;
                }
                None
            }
            ImuState::SeekType => {
                if ImuFrameType::from_byte(byte).is_some() {
                    self.buffer[1] = byte;
                    self.position = 2;
                    self.checksum = self.checksum.wrapping_add(byte);
                    self.state = ImuState::ReceiveData;
                } else {
                    self.stats.framing_errors += 1;
                    trace!("IMU unknown frame type 0x{:02X}", byte);
                    self.reset();
                }
                None
            }
            ImuState::ReceiveData => {
                self.buffer[self.position] = byte;
                self.position += 1;

                if self.position < IMU_FRAME_LENGTH {
                    self.checksum = self.checksum.wrapping_add(byte);
                    return None;
                }

                let frame = self.finish_frame();
                self.reset();
                frame
            }
        }
    }

    /// Consumes a block of bytes, returning every frame completed, in order.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<ImuFrame> {
        bytes.iter().filter_map(|&b| self.push_byte(b)).collect()
    }

    /// Reports a poll that produced no bytes.
    pub fn tick_idle(&mut self) {
        if self.state != ImuState::SeekHead && self.step_timeout() {
            debug!("IMU receiver idle mid-frame, resynchronising");
        }
    }

    fn step_timeout(&mut self) -> bool {
        self.timeout += 1;
        if self.timeout > self.timeout_limit {
            self.stats.timeouts += 1;
            self.reset();
            return true;
        }
        false
    }

    fn finish_frame(&mut self) -> Option<ImuFrame> {
        let received = self.buffer[IMU_FRAME_LENGTH - 1];
        if received != self.checksum {
            self.stats.checksum_errors += 1;
            debug!(
                "IMU checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
                self.checksum, received
            );
            return None;
        }

        let frame_type = ImuFrameType::from_byte(self.buffer[1])?;
        let mut payload = [0u8; IMU_PAYLOAD_SIZE];
        payload.copy_from_slice(&self.buffer[2..2 + IMU_PAYLOAD_SIZE]);

        self.stats.frames += 1;
        Some(decode_payload(frame_type, &payload))
    }

    fn reset(&mut self) {
        self.state = ImuState::SeekHead;
        self.position = 0;
        self.checksum = 0;
        self.timeout = 0;
    }
}
