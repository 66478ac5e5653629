use ev_core::{BatchId, BatchRun, BatchStatus};

/// Snapshot pushed to subscribers whenever a batch changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub batch_id: BatchId,
    pub progress: u8,
    pub status: BatchStatus,
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn from_run(run: &BatchRun) -> Self {
        Self {
            batch_id: run.id,
            progress: run.progress(),
            status: run.status(),
            message: run.error_message().map(str::to_string),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
