//! Batch run lifecycle.
//!
//! `pending -> running -> {completed | failed}`; a terminal run never
//! changes again and progress never goes backwards.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::BatchId;

/// Share of progress available to job completions; the rest is
/// reserved for result verification.
pub const JOB_PROGRESS_CAP: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Batch {id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub id: BatchId,
    pub from: BatchStatus,
    pub to: BatchStatus,
}

/// One batch of variant simulations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: BatchId,
    pub name: String,
    pub total_variants: usize,
    progress: f64,
    status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchRun {
    pub fn new(id: BatchId, name: impl Into<String>, total_variants: usize) -> Self {
        Self {
            id,
            name: name.into(),
            total_variants,
            progress: 0.0,
            status: BatchStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// Progress rounded to whole percent, 0..=100.
    pub fn progress(&self) -> u8 {
        self.progress.clamp(0.0, 100.0).round() as u8
    }

    pub fn progress_exact(&self) -> f64 {
        self.progress
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(BatchStatus::Running)
    }

    /// Count one finished job. Returns false once the run is not running.
    pub fn record_completion(&mut self) -> bool {
        if self.status != BatchStatus::Running || self.total_variants == 0 {
            return false;
        }
        let step = JOB_PROGRESS_CAP / self.total_variants as f64;
        self.progress = (self.progress + step).min(JOB_PROGRESS_CAP).max(self.progress);
        true
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(BatchStatus::Completed)?;
        self.progress = 100.0;
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(BatchStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    fn transition(&mut self, to: BatchStatus) -> Result<(), TransitionError> {
        let allowed = matches!(
            (self.status, to),
            (BatchStatus::Pending, BatchStatus::Running)
                | (BatchStatus::Pending, BatchStatus::Failed)
                | (BatchStatus::Running, BatchStatus::Completed)
                | (BatchStatus::Running, BatchStatus::Failed)
        );
        if !allowed {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn progress_is_monotonic_and_capped(total in 1usize..200, completions in 0usize..400) {
            let mut run = BatchRun::new(BatchId::new(), "prop", total);
            run.start().unwrap();
            let mut last = run.progress_exact();
            for _ in 0..completions {
                run.record_completion();
                prop_assert!(run.progress_exact() >= last);
                prop_assert!(run.progress_exact() <= JOB_PROGRESS_CAP);
                last = run.progress_exact();
            }
            if completions >= total {
                prop_assert_eq!(run.progress(), 90);
            }
        }
    }
}
