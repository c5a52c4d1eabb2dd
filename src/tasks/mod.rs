//! # Tasks Module
//!
//! The periodic tasks that make up the control core, and the plumbing they
//! share.
//!
//! This module handles:
//! - SBUS polling and frame publication ([`sbus`])
//! - IMU polling and sample publication ([`imu`])
//! - Command mapping, link supervision, gait ticks and servo writes ([`control`])
//! - Communication-loss detection ([`link`])
//! - A monotonic millisecond clock shared by all tasks ([`Clock`])
//!
//! Tasks exchange only the latest value of each stream through
//! `tokio::sync::watch` and stop when the shared shutdown flag turns `true`.

pub mod control;
pub mod imu;
pub mod link;
pub mod sbus;

use tokio::sync::watch;
use tokio::time::Instant;

/// Milliseconds since start-up, from tokio's clock so paused-time tests see
/// the same time base as the tasks.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    /// Starts the clock at zero.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Waits until the shutdown flag is raised or its sender is dropped.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
