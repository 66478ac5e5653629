//! Batch orchestration: materialize variants, fan them out to the worker
//! pool, and aggregate the outcomes once every job has ended.
//!
//! A batch is only `completed` when the result sink reports at least one
//! stored row after aggregation. Per-variant failures are recorded in the
//! manifest and never stop sibling jobs.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use ev_construct::Injector;
use ev_core::{BatchId, BatchRun, ConstructionSet};
use ev_idf::Document;
use ev_results::{
    BatchManifest, JsonlResultStore, ResultSink, ResultsResult, VariantFailure, VariantResultRow,
    compute_batch_fingerprint, compute_variant_key,
};
use rayon::ThreadPool;

use crate::engine::{CancelToken, JobFailure, SimulationEngine, SimulationJob, SimulationOutput};
use crate::error::{AppError, AppResult};
use crate::task_group::{TaskGroup, TaskPanic};
use crate::tracker::BatchTracker;

pub const CANCELLED_MESSAGE: &str = "cancelled by user";

const INPUT_FILE: &str = "in.idf";
const OUTPUT_DIR: &str = "out";

/// Everything needed to start one batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub name: String,
    pub documents: Vec<Document>,
    pub construction_sets: Vec<ConstructionSet>,
    pub weather: PathBuf,
}

impl BatchRequest {
    pub fn total_variants(&self) -> usize {
        self.documents.len() * self.construction_sets.len()
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Root under which each batch gets `<batch_id>/d{idf}_v{variant}/`.
    pub work_dir: PathBuf,
    /// Worker threads; rayon's default when `None`.
    pub workers: Option<usize>,
}

impl OrchestratorSettings {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            workers: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
}

/// Identity of one (document, construction set) pair.
#[derive(Debug, Clone)]
struct VariantMeta {
    idf_idx: usize,
    variant_idx: usize,
    set: ConstructionSet,
}

/// A materialized variant, or the reason it could not be materialized.
#[derive(Debug)]
struct PlannedJob {
    job: Result<SimulationJob, JobFailure>,
}

type JobOutcome = Result<SimulationOutput, JobFailure>;

pub struct Orchestrator {
    pool: Arc<ThreadPool>,
    engine: Arc<dyn SimulationEngine>,
    sink: Arc<dyn ResultSink>,
    manifests: Option<JsonlResultStore>,
    tracker: BatchTracker,
    work_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        engine: Arc<dyn SimulationEngine>,
        sink: Arc<dyn ResultSink>,
    ) -> AppResult<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("ev-worker-{i}"));
        if let Some(workers) = settings.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder.build().map_err(|e| AppError::Pool(e.to_string()))?;
        tracing::debug!(workers = pool.current_num_threads(), "worker pool ready");

        Ok(Self {
            pool: Arc::new(pool),
            engine,
            sink,
            manifests: None,
            tracker: BatchTracker::new(),
            work_dir: settings.work_dir,
        })
    }

    /// Write a manifest for every batch that reaches a terminal state.
    pub fn with_manifest_store(mut self, store: JsonlResultStore) -> Self {
        self.manifests = Some(store);
        self
    }

    /// Share an existing tracker, e.g. one a UI already subscribes to.
    pub fn with_tracker(mut self, tracker: BatchTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> &BatchTracker {
        &self.tracker
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn batch_dir(&self, batch_id: BatchId) -> PathBuf {
        self.work_dir.join(batch_id.to_string())
    }

    /// Validate, materialize and submit a batch. Returns as soon as every
    /// job is queued.
    pub fn dispatch(&self, request: BatchRequest) -> AppResult<BatchHandle> {
        if request.documents.is_empty() {
            return Err(AppError::InvalidInput("batch has no documents".to_string()));
        }
        if request.construction_sets.is_empty() {
            return Err(AppError::InvalidInput("batch has no construction sets".to_string()));
        }
        for set in &request.construction_sets {
            set.validate()?;
        }

        let total = request.total_variants();
        let batch_id = self.tracker.register(BatchRun::new(BatchId::new(), &request.name, total));
        tracing::info!(%batch_id, name = %request.name, variants = total, "dispatching batch");

        let texts: Vec<String> = request.documents.iter().map(Document::to_idf_string).collect();
        let fingerprint = compute_batch_fingerprint(&texts, &request.construction_sets, &self.engine.signature());

        let (variants, jobs) = match self.materialize(batch_id, &request) {
            Ok(planned) => planned,
            Err(err) => {
                self.abandon(batch_id, format!("failed to prepare variants: {err}"));
                return Err(err);
            }
        };

        self.tracker.start(batch_id)?;

        let cancel = CancelToken::new();
        let run = {
            let engine = Arc::clone(&self.engine);
            let tracker = self.tracker.clone();
            let cancel = cancel.clone();
            move |_: usize, planned: PlannedJob| -> JobOutcome {
                let _completion = CompletionGuard {
                    tracker: &tracker,
                    batch_id,
                };
                let job = planned.job?;
                if cancel.is_cancelled() {
                    return Err(JobFailure::Cancelled);
                }
                tracing::debug!(%batch_id, idf = job.idf_idx, variant = job.variant_idx, "simulating variant");
                engine.simulate(&job, &cancel)
            }
        };

        let aggregation = Aggregation {
            batch_id,
            tracker: self.tracker.clone(),
            sink: Arc::clone(&self.sink),
            manifests: self.manifests.clone(),
            fingerprint,
            variants,
        };
        let group = match TaskGroup::spawn(&self.pool, jobs, run, move |outcomes| aggregation.run(outcomes)) {
            Ok(group) => group,
            Err(err) => {
                self.abandon(batch_id, format!("failed to start aggregation: {err}"));
                return Err(err.into());
            }
        };

        Ok(BatchHandle {
            batch_id,
            tracker: self.tracker.clone(),
            cancel,
            group,
        })
    }

    fn materialize(&self, batch_id: BatchId, request: &BatchRequest) -> AppResult<(Vec<VariantMeta>, Vec<PlannedJob>)> {
        let batch_dir = self.batch_dir(batch_id);
        let mut variants = Vec::with_capacity(request.total_variants());
        let mut jobs = Vec::with_capacity(request.total_variants());

        for (idf_idx, base) in request.documents.iter().enumerate() {
            for (variant_idx, set) in request.construction_sets.iter().enumerate() {
                let variant_dir = batch_dir.join(format!("d{idf_idx}_v{variant_idx}"));
                let output_dir = variant_dir.join(OUTPUT_DIR);
                std::fs::create_dir_all(&output_dir)?;

                let mut doc = base.clone();
                let injector = Injector::with_seed(format!("{batch_id}-{idf_idx}-{variant_idx}"));
                let job = match injector.inject(&mut doc, set) {
                    Ok(report) => {
                        for warning in &report.warnings {
                            tracing::warn!(%batch_id, idf = idf_idx, variant = variant_idx, %warning, "injection warning");
                        }
                        let idf_path = variant_dir.join(INPUT_FILE);
                        doc.write_file(&idf_path)?;
                        Ok(SimulationJob {
                            batch_id,
                            idf_idx,
                            variant_idx,
                            idf_path,
                            weather_path: request.weather.clone(),
                            output_dir,
                        })
                    }
                    Err(err) => {
                        tracing::error!(%batch_id, idf = idf_idx, variant = variant_idx, %err, "variant not simulated");
                        Err(JobFailure::Injection(err.to_string()))
                    }
                };

                variants.push(VariantMeta {
                    idf_idx,
                    variant_idx,
                    set: set.clone(),
                });
                jobs.push(PlannedJob { job });
            }
        }
        Ok((variants, jobs))
    }

    fn abandon(&self, batch_id: BatchId, message: String) {
        tracing::error!(%batch_id, %message, "batch abandoned");
        if let Err(err) = self.tracker.fail(batch_id, message) {
            tracing::warn!(%batch_id, %err, "could not mark batch failed");
        }
    }
}

/// Counts a job as finished however it ends, including by panic.
struct CompletionGuard<'a> {
    tracker: &'a BatchTracker,
    batch_id: BatchId,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.tracker.record_completion(self.batch_id);
    }
}

/// State the fan-in callback needs once all jobs have ended.
struct Aggregation {
    batch_id: BatchId,
    tracker: BatchTracker,
    sink: Arc<dyn ResultSink>,
    manifests: Option<JsonlResultStore>,
    fingerprint: String,
    variants: Vec<VariantMeta>,
}

impl Aggregation {
    fn run(self, outcomes: Vec<Result<JobOutcome, TaskPanic>>) {
        let batch_id = self.batch_id;
        let total = self.variants.len();
        let mut rows = Vec::new();
        let mut failures = Vec::new();

        for (meta, outcome) in self.variants.iter().zip(outcomes) {
            match outcome.unwrap_or_else(|p| Err(JobFailure::Panicked(p.message))) {
                Ok(output) => rows.push(VariantResultRow {
                    batch_id,
                    variant_idx: meta.variant_idx,
                    idf_idx: meta.idf_idx,
                    construction_set: meta.set.clone(),
                    variant_key: compute_variant_key(meta.idf_idx, &meta.set),
                    metrics: output.metrics,
                    hourly_rows: output.hourly_rows,
                    completed_at: Utc::now(),
                }),
                Err(failure) => failures.push(VariantFailure {
                    idf_idx: meta.idf_idx,
                    variant_idx: meta.variant_idx,
                    label: meta.set.label(),
                    kind: failure.kind().to_string(),
                    message: failure.to_string(),
                }),
            }
        }

        let already_terminal = self.tracker.snapshot(batch_id).is_none_or(|run| run.is_terminal());
        let rows_persisted = if already_terminal {
            tracing::info!(%batch_id, "batch ended before aggregation, results not persisted");
            0
        } else {
            self.persist(&rows, failures.len(), total)
        };

        tracing::info!(
            %batch_id,
            succeeded = rows.len(),
            failed = failures.len(),
            persisted = rows_persisted,
            "batch aggregated"
        );
        self.write_manifest(rows_persisted, failures);
    }

    /// Insert rows and gate completion on what the sink actually holds.
    fn persist(&self, rows: &[VariantResultRow], failed: usize, total: usize) -> usize {
        let batch_id = self.batch_id;
        let stored = panic::catch_unwind(AssertUnwindSafe(|| store_rows(self.sink.as_ref(), batch_id, rows)));
        let (outcome, persisted) = match stored {
            Ok(Ok(count)) if count > 0 => (self.tracker.complete(batch_id), count),
            Ok(Ok(_)) => {
                let message = format!("no results persisted ({failed} of {total} variants failed)");
                (self.tracker.fail(batch_id, message), 0)
            }
            Ok(Err(err)) => (self.tracker.fail(batch_id, format!("result sink error: {err}")), 0),
            Err(payload) => {
                let panic = TaskPanic::from_payload(payload);
                (self.tracker.fail(batch_id, format!("aggregation {panic}")), 0)
            }
        };
        if let Err(err) = outcome {
            tracing::warn!(%batch_id, %err, "batch changed state during aggregation");
        }
        persisted
    }

    fn write_manifest(&self, rows_persisted: usize, failures: Vec<VariantFailure>) {
        let Some(store) = &self.manifests else {
            return;
        };
        let Some(run) = self.tracker.snapshot(self.batch_id) else {
            return;
        };
        let manifest = BatchManifest {
            run,
            fingerprint: self.fingerprint.clone(),
            rows_persisted,
            failures,
        };
        if let Err(err) = store.save_manifest(&manifest) {
            tracing::error!(batch_id = %self.batch_id, %err, "failed to write batch manifest");
        }
    }
}

fn store_rows(sink: &dyn ResultSink, batch_id: BatchId, rows: &[VariantResultRow]) -> ResultsResult<usize> {
    if !rows.is_empty() {
        let inserted = sink.insert_rows(batch_id, rows)?;
        tracing::debug!(%batch_id, inserted, "rows handed to sink");
    }
    sink.count(batch_id)
}

/// Handle to a dispatched batch.
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: BatchId,
    tracker: BatchTracker,
    cancel: CancelToken,
    group: TaskGroup,
}

impl BatchHandle {
    pub fn id(&self) -> BatchId {
        self.batch_id
    }

    pub fn snapshot(&self) -> Option<BatchRun> {
        self.tracker.snapshot(self.batch_id)
    }

    /// Stop the batch: queued jobs end as cancelled, running engine
    /// processes are killed. No-op once the batch is terminal.
    pub fn cancel(&self) -> AppResult<()> {
        if self.snapshot().is_none_or(|run| run.is_terminal()) {
            return Ok(());
        }
        self.cancel.cancel();
        tracing::info!(batch_id = %self.batch_id, "batch cancelled");
        match self.tracker.fail(self.batch_id, CANCELLED_MESSAGE) {
            Ok(()) | Err(AppError::State(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether aggregation has finished.
    pub fn is_finished(&self) -> bool {
        self.group.is_finished()
    }

    /// Block until aggregation has finished and return the final run.
    ///
    /// The run is removed from the tracker afterwards; the returned value
    /// (and the manifest, when a store is set) is its last record.
    pub fn wait(self) -> AppResult<BatchRun> {
        let batch_id = self.batch_id;
        if let Err(panic) = self.group.join() {
            tracing::error!(%batch_id, %panic, "aggregation did not finish");
            if let Err(err) = self.tracker.fail(batch_id, format!("aggregation {panic}")) {
                tracing::warn!(%batch_id, %err, "batch already terminal");
            }
        }
        self.tracker
            .forget(batch_id)
            .ok_or_else(|| AppError::BatchNotFound(batch_id.to_string()))
    }
}
