//! Where variant rows go.

use std::collections::HashMap;

use ev_core::BatchId;
use parking_lot::Mutex;

use crate::ResultsResult;
use crate::types::VariantResultRow;

/// Durable (or in-process) destination for result rows.
///
/// `count` must reflect what is actually stored, not what was handed in:
/// the orchestrator only declares a batch complete when it is non-zero.
pub trait ResultSink: Send + Sync {
    /// Store `rows`; returns how many were accepted.
    fn insert_rows(&self, batch_id: BatchId, rows: &[VariantResultRow]) -> ResultsResult<usize>;

    fn count(&self, batch_id: BatchId) -> ResultsResult<usize>;
}

/// Mutex-guarded sink kept in memory.
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    rows: Mutex<HashMap<BatchId, Vec<VariantResultRow>>>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, batch_id: BatchId) -> Vec<VariantResultRow> {
        self.rows.lock().get(&batch_id).cloned().unwrap_or_default()
    }
}

impl ResultSink for MemoryResultSink {
    fn insert_rows(&self, batch_id: BatchId, rows: &[VariantResultRow]) -> ResultsResult<usize> {
        self.rows
            .lock()
            .entry(batch_id)
            .or_default()
            .extend_from_slice(rows);
        Ok(rows.len())
    }

    fn count(&self, batch_id: BatchId) -> ResultsResult<usize> {
        Ok(self.rows.lock().get(&batch_id).map_or(0, Vec::len))
    }
}
