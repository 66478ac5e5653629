//! Error types for the ev-app service layer.

use std::path::PathBuf;

use ev_core::{BatchId, TransitionError, ValidationError};

/// Application error wrapping the backend crates for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read config file: {}", .path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Injection failed: {0}")]
    Inject(String),

    #[error("Catalogue error: {0}")]
    Catalogue(String),

    #[error("Expansion error: {0}")]
    Expand(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Batch state error: {0}")]
    State(#[from] TransitionError),

    #[error("Batch {id} failed: {message}")]
    BatchFailed { id: BatchId, message: String },

    #[error("Worker pool error: {0}")]
    Pool(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ev-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<ev_idf::IdfError> for AppError {
    fn from(err: ev_idf::IdfError) -> Self {
        AppError::Document(err.to_string())
    }
}

impl From<ev_idf::ParseError> for AppError {
    fn from(err: ev_idf::ParseError) -> Self {
        AppError::Document(err.to_string())
    }
}

impl From<ev_construct::InjectError> for AppError {
    fn from(err: ev_construct::InjectError) -> Self {
        match err {
            ev_construct::InjectError::Validation(e) => AppError::Validation(e),
            other => AppError::Inject(other.to_string()),
        }
    }
}

impl From<ev_construct::CatalogueError> for AppError {
    fn from(err: ev_construct::CatalogueError) -> Self {
        AppError::Catalogue(err.to_string())
    }
}

impl From<ev_construct::ExpandError> for AppError {
    fn from(err: ev_construct::ExpandError) -> Self {
        AppError::Expand(err.to_string())
    }
}

impl From<ev_results::ResultsError> for AppError {
    fn from(err: ev_results::ResultsError) -> Self {
        match err {
            ev_results::ResultsError::BatchNotFound { batch_id } => AppError::BatchNotFound(batch_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
