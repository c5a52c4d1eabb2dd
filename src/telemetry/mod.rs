//! # Telemetry Module
//!
//! Handles telemetry logging to JSONL files with rotation.
//!
//! This module handles:
//! - Sampling the control status and the IMU aggregate on a fixed period
//! - Formatting as JSONL (JSON Lines)
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files

pub mod logger;
pub mod types;

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::imu::protocol::ImuSample;
use crate::tasks::control::ControlStatus;

pub use logger::TelemetryLogger;
pub use types::TelemetryRecord;

/// Writes one record per `period` until shutdown, then flushes.
pub async fn run(
    mut logger: TelemetryLogger,
    period: Duration,
    status: watch::Receiver<Option<ControlStatus>>,
    imu: watch::Receiver<ImuSample>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Telemetry logging to {}", logger.dir().display());
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failing = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let record = TelemetryRecord::now(*status.borrow(), *imu.borrow());
                match logger.log(&record) {
                    Ok(()) => failing = false,
                    Err(e) => {
                        if !failing {
                            warn!("Telemetry write failed: {}", e);
                        }
                        failing = true;
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

    if let Err(e) = logger.flush() {
        warn!("Telemetry flush failed: {}", e);
    }
    info!("Telemetry stopped after {} records", logger.records_written());
}
