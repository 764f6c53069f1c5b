//! Core run types for the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::graph::LoopNode;
use crate::error::LoopError;
use crate::types::{ModelMessage, Usage};

/// Unique run identifier.
pub type RunId = Uuid;

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Canceled,
}

impl RunStatus {
    /// Status a finished run reports for its result.
    pub fn of(result: &Result<RunOutcome, LoopError>) -> Self {
        match result {
            Ok(_) => Self::Completed,
            Err(LoopError::Canceled) => Self::Canceled,
            Err(_) => Self::Failed,
        }
    }
}

/// Successful result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    /// The final message: the last model message, or the directly returned
    /// tool result.
    pub message: ModelMessage,
    /// Everything appended during the run, seed included.
    pub history: Vec<ModelMessage>,
    /// Nodes in the order they were entered, ending in a terminal node.
    pub trace: Vec<LoopNode>,
    /// Number of step executions.
    pub steps: usize,
    #[serde(default)]
    pub usage: Usage,
    pub finished_at: DateTime<Utc>,
}

/// Handle to a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    cancel: CancellationToken,
    result_rx: oneshot::Receiver<Result<RunOutcome, LoopError>>,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: RunId,
        cancel: CancellationToken,
    ) -> (Self, oneshot::Sender<Result<RunOutcome, LoopError>>) {
        let (result_tx, result_rx) = oneshot::channel();
        (
            Self {
                run_id,
                cancel,
                result_rx,
            },
            result_tx,
        )
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Cancel the run. Returns false if it was already canceled.
    pub fn abort(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunOutcome, LoopError> {
        self.result_rx.await.unwrap_or(Err(LoopError::Canceled))
    }
}
