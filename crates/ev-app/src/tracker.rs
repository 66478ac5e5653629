//! Shared registry of batch runs.
//!
//! Every run sits behind its own mutex, so concurrent job completions
//! serialize their read-modify-write of the progress value.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use ev_core::{BatchId, BatchRun};
use parking_lot::{Mutex, RwLock};

use crate::error::{AppError, AppResult};
use crate::progress::ProgressEvent;

#[derive(Debug, Default)]
struct TrackerInner {
    runs: RwLock<HashMap<BatchId, Arc<Mutex<BatchRun>>>>,
    subscribers: Mutex<Vec<Sender<ProgressEvent>>>,
}

/// Cheap to clone; clones share the same runs.
#[derive(Debug, Clone, Default)]
pub struct BatchTracker {
    inner: Arc<TrackerInner>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, run: BatchRun) -> BatchId {
        let id = run.id;
        let event = ProgressEvent::from_run(&run);
        self.inner.runs.write().insert(id, Arc::new(Mutex::new(run)));
        self.notify(event);
        id
    }

    pub fn snapshot(&self, batch_id: BatchId) -> Option<BatchRun> {
        self.slot(batch_id).map(|slot| slot.lock().clone())
    }

    /// Drop a run from the registry, returning its last state.
    pub fn forget(&self, batch_id: BatchId) -> Option<BatchRun> {
        let slot = self.inner.runs.write().remove(&batch_id)?;
        let run = slot.lock().clone();
        Some(run)
    }

    pub fn batch_ids(&self) -> Vec<BatchId> {
        self.inner.runs.read().keys().copied().collect()
    }

    /// Receive an event for every subsequent change of any batch.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    pub fn start(&self, batch_id: BatchId) -> AppResult<()> {
        self.update(batch_id, |run| run.start().map_err(AppError::from))
    }

    /// Count one finished job; returns the new progress, or `None` when the
    /// batch is unknown or no longer running.
    pub fn record_completion(&self, batch_id: BatchId) -> Option<u8> {
        let slot = self.slot(batch_id)?;
        let mut run = slot.lock();
        if !run.record_completion() {
            return None;
        }
        // Sent under the run lock so subscribers see progress in order.
        self.notify(ProgressEvent::from_run(&run));
        Some(run.progress())
    }

    pub fn complete(&self, batch_id: BatchId) -> AppResult<()> {
        self.update(batch_id, |run| run.complete().map_err(AppError::from))
    }

    pub fn fail(&self, batch_id: BatchId, message: impl Into<String>) -> AppResult<()> {
        let message = message.into();
        self.update(batch_id, |run| run.fail(message).map_err(AppError::from))
    }

    fn slot(&self, batch_id: BatchId) -> Option<Arc<Mutex<BatchRun>>> {
        self.inner.runs.read().get(&batch_id).cloned()
    }

    fn update<F>(&self, batch_id: BatchId, change: F) -> AppResult<()>
    where
        F: FnOnce(&mut BatchRun) -> AppResult<()>,
    {
        let slot = self
            .slot(batch_id)
            .ok_or_else(|| AppError::BatchNotFound(batch_id.to_string()))?;
        let mut run = slot.lock();
        change(&mut run)?;
        self.notify(ProgressEvent::from_run(&run));
        Ok(())
    }

    fn notify(&self, event: ProgressEvent) {
        self.inner
            .subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
