//! # IMU Task
//!
//! Polls the IMU receive ring and publishes the updated sample whenever at
//! least one frame passed its checksum.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ImuConfig;
use crate::imu::decoder::{ImuDecoder, ImuStats};
use crate::imu::protocol::ImuSample;
use crate::ring::RingReader;

/// Polls between decoder statistics log lines
const STATS_LOG_EVERY_POLLS: u64 = 1000;

/// Ring reader, decoder and the running aggregate.
#[derive(Debug)]
pub struct ImuPoller {
    reader: RingReader,
    decoder: ImuDecoder,
    sample: ImuSample,
    scratch: Vec<u8>,
}

impl ImuPoller {
    #[must_use]
    pub fn new(reader: RingReader, frame_timeout: u32) -> Self {
        Self {
            reader,
            decoder: ImuDecoder::with_timeout(frame_timeout),
            sample: ImuSample::default(),
            scratch: Vec::new(),
        }
    }

    /// Folds every newly completed frame into the sample.
    ///
    /// Returns the sample only when it changed during this poll.
    pub fn poll(&mut self) -> Option<ImuSample> {
        self.scratch.clear();
        if self.reader.drain_into(&mut self.scratch) == 0 {
            self.decoder.tick_idle();
            return None;
        }

        let frames = self.decoder.push_bytes(&self.scratch);
        if frames.is_empty() {
            return None;
        }
        for frame in &frames {
            self.sample.apply(frame);
        }
        Some(self.sample)
    }

    #[must_use]
    pub fn stats(&self) -> ImuStats {
        self.decoder.stats()
    }
}

/// Runs the IMU poll loop until shutdown.
pub async fn run(
    mut poller: ImuPoller,
    config: ImuConfig,
    samples: watch::Sender<ImuSample>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("IMU task started, polling every {} ms", config.poll_interval_ms);
    let mut ticker = interval(Duration::from_millis(config.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut polls: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(sample) = poller.poll() {
                    samples.send_replace(sample);
                }

                polls += 1;
                if polls % STATS_LOG_EVERY_POLLS == 0 {
                    let stats = poller.stats();
                    debug!(
                        "IMU frames={} framing_errors={} checksum_errors={} timeouts={}",
                        stats.frames, stats.framing_errors, stats.checksum_errors, stats.timeouts
                    );
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("IMU task stopped");
}
