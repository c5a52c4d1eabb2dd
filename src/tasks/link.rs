//! # Link Monitor
//!
//! Communication-loss detection for the SBUS link. The link counts as up while
//! the newest valid frame is younger than the failsafe timeout.

use serde::Serialize;
use tracing::{info, warn};

/// Link health as seen by the control task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Up,
    Lost,
}

/// Tracks frame age and logs transitions once.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    timeout_ms: u64,
    status: LinkStatus,
    ever_up: bool,
}

impl LinkMonitor {
    /// Starts in `Lost` until the first frame arrives.
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            status: LinkStatus::Lost,
            ever_up: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Re-evaluates the link given the newest frame timestamp, if any.
    pub fn check(&mut self, last_frame_at: Option<u64>, now_ms: u64) -> LinkStatus {
        let fresh = last_frame_at
            .map(|at| now_ms.saturating_sub(at) <= self.timeout_ms)
            .unwrap_or(false);
        let status = if fresh { LinkStatus::Up } else { LinkStatus::Lost };

        if status != self.status {
            match status {
                LinkStatus::Up if self.ever_up => info!("SBUS link restored"),
                LinkStatus::Up => info!("SBUS link established"),
                LinkStatus::Lost => warn!(
                    "SBUS link lost: no frame for {} ms, forcing Stop",
                    self.timeout_ms
                ),
            }
            self.ever_up |= status == LinkStatus::Up;
            self.status = status;
        }

        status
    }
}
