//! Observable run state

use serde::{Deserialize, Serialize};

use crate::error::DeliveryErrorKind;

/// Completed versus total selected recipients for the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    /// Selected recipients already handled, including ones sent by earlier runs
    pub completed: usize,
    /// Selected recipients when the run started
    pub total: usize,
}

impl RunProgress {
    /// Completion percentage, 0 when nothing is selected
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.completed.min(self.total) * 100) / self.total;
        u8::try_from(pct).unwrap_or(100)
    }
}

impl From<RunProgress> for RunEvent {
    fn from(progress: RunProgress) -> Self {
        Self::Progress {
            completed: progress.completed,
            total: progress.total,
            percent: progress.percent(),
        }
    }
}

/// Outcome counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Recipients delivered during this run
    pub sent: usize,
    /// Recipients that failed during this run
    pub failed: usize,
    /// In-flight recipient aborted by cancellation
    pub cancelled: usize,
    /// Delivery calls made
    pub dispatched: usize,
    /// Run ended before visiting every entry
    pub stopped_early: bool,
}

impl RunSummary {
    /// Whether every dispatched recipient was delivered
    #[must_use]
    pub const fn all_sent(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

/// Notification published while a run executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run began
    Started {
        /// Sender address for the run
        sender: String,
        /// Selected recipients
        total: usize,
    },
    /// Delivery call issued
    Dispatching {
        /// Recipient address
        address: String,
    },
    /// Recipient delivered
    Sent {
        /// Recipient address
        address: String,
        /// Relay message identifier
        id: String,
    },
    /// Recipient failed
    Failed {
        /// Recipient address
        address: String,
        /// Failure kind
        kind: DeliveryErrorKind,
        /// Failure detail
        detail: String,
    },
    /// In-flight call aborted
    Cancelled {
        /// Recipient address
        address: String,
    },
    /// Progress changed
    Progress {
        /// Selected recipients handled so far
        completed: usize,
        /// Selected recipients in the run
        total: usize,
        /// Completion percentage
        percent: u8,
    },
    /// Run ended
    Finished(RunSummary),
}
