//! # SBUS Task
//!
//! Polls the SBUS receive ring, decodes frames and publishes the newest one
//! with its arrival time.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::Clock;
use crate::config::SbusConfig;
use crate::ring::RingReader;
use crate::sbus::decoder::{SbusDecoder, SbusStats};
use crate::sbus::protocol::{ChannelFrame, SbusPacket};

/// Interval between decoder statistics log lines
const STATS_LOG_INTERVAL_MS: u64 = 10_000;

/// Ring reader plus decoder, one poll per task tick.
#[derive(Debug)]
pub struct SbusPoller {
    reader: RingReader,
    decoder: SbusDecoder,
    scratch: Vec<u8>,
}

impl SbusPoller {
    #[must_use]
    pub fn new(reader: RingReader, frame_timeout: u32) -> Self {
        Self {
            reader,
            decoder: SbusDecoder::with_timeout(frame_timeout),
            scratch: Vec::new(),
        }
    }

    /// Consumes every new byte and returns the last complete packet, if any.
    pub fn poll(&mut self) -> Option<SbusPacket> {
        self.scratch.clear();
        if self.reader.drain_into(&mut self.scratch) == 0 {
            self.decoder.tick_idle();
            return None;
        }
        self.decoder.push_bytes(&self.scratch).pop()
    }

    #[must_use]
    pub fn stats(&self) -> SbusStats {
        self.decoder.stats()
    }
}

/// Runs the SBUS poll loop until shutdown.
pub async fn run(
    mut poller: SbusPoller,
    config: SbusConfig,
    clock: Clock,
    frames: watch::Sender<Option<ChannelFrame>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("SBUS task started, polling every {} ms", config.poll_interval_ms);
    let mut ticker = interval(Duration::from_millis(config.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_stats_log = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.now_ms();
                if let Some(packet) = poller.poll() {
                    frames.send_replace(Some(ChannelFrame::new(packet, now)));
                }

                if now - last_stats_log >= STATS_LOG_INTERVAL_MS {
                    let stats = poller.stats();
                    debug!(
                        "SBUS frames={} framing_errors={} timeouts={}",
                        stats.frames, stats.framing_errors, stats.timeouts
                    );
                    last_stats_log = now;
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("SBUS task stopped");
}
