//! Error classification for loop failures.

use serde::{Deserialize, Serialize};

/// Broad error category, used by callers to tell apart who gave up and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A model or tool backend call failed.
    Backend,
    /// The early-exit policy pointed at a result that does not exist.
    Invariant,
    /// The step bound was reached before the loop ended.
    NonConvergence,
    /// The caller canceled the run.
    Cancellation,
    Timeout,
    Configuration,
    Serialization,
    Unknown,
}

impl ErrorCategory {
    /// Whether this category indicates a bug rather than a runtime condition.
    pub fn is_logic_error(self) -> bool {
        matches!(self, Self::Invariant)
    }
}
