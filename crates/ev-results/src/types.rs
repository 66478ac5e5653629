//! Result data types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ev_core::{BatchId, BatchRun, ConstructionSet};
use serde::{Deserialize, Serialize};

/// One simulated variant, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResultRow {
    pub batch_id: BatchId,
    pub variant_idx: usize,
    pub idf_idx: usize,
    pub construction_set: ConstructionSet,
    pub variant_key: String,
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub hourly_rows: usize,
    pub completed_at: DateTime<Utc>,
}

/// Why one variant produced no row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantFailure {
    pub idf_idx: usize,
    pub variant_idx: usize,
    pub label: String,
    /// Short machine-friendly failure kind, e.g. `timed_out`.
    pub kind: String,
    pub message: String,
}

/// Terminal record of a batch, written next to its rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub run: BatchRun,
    pub fingerprint: String,
    pub rows_persisted: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<VariantFailure>,
}
