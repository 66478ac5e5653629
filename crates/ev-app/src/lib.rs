//! Shared application service layer for envariant.
//!
//! Loads batch configs, expands variants, and runs them in parallel
//! through a simulation engine, persisting results to a sink. Used by the
//! CLI and by anything embedding the orchestrator directly.

pub mod batch_service;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod task_group;
pub mod tracker;

pub use batch_service::{
    BatchPlan, candidate_groups, expand_variants, inject_file, load_construction_set, load_documents,
    open_store, orchestrator_for, plan_batch,
};
pub use config::{BatchConfig, EngineConfig};
pub use engine::{CancelToken, ExternalEngine, JobFailure, SimulationEngine, SimulationJob, SimulationOutput};
pub use error::{AppError, AppResult};
pub use orchestrator::{BatchHandle, BatchRequest, CANCELLED_MESSAGE, Orchestrator, OrchestratorSettings};
pub use progress::ProgressEvent;
pub use task_group::{TaskGroup, TaskPanic};
pub use tracker::BatchTracker;
