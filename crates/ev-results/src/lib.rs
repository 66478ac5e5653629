//! ev-results: variant result rows, result bundles and batch storage.

pub mod bundle;
pub mod hash;
pub mod sink;
pub mod store;
pub mod types;

use std::path::PathBuf;

pub use bundle::{ResultBundle, read_bundle};
pub use hash::{compute_batch_fingerprint, compute_variant_key};
pub use sink::{MemoryResultSink, ResultSink};
pub use store::JsonlResultStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Batch not found: {batch_id}")]
    BatchNotFound { batch_id: String },

    #[error("Result report missing: {}", .path.display())]
    MissingReport { path: PathBuf },

    #[error("Malformed result report {}: {message}", .path.display())]
    MalformedReport { path: PathBuf, message: String },

    #[error("Result sink error: {0}")]
    Sink(String),
}
