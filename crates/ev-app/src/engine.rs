//! Simulation engine seam and the external-process implementation.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use ev_core::BatchId;
use ev_results::read_bundle;

use crate::config::EngineConfig;

const STDOUT_LOG: &str = "engine.out";
const STDERR_LOG: &str = "engine.err";
const LOG_TAIL_LINES: usize = 20;

/// Shared cancellation flag for one batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one engine run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationJob {
    pub batch_id: BatchId,
    pub idf_idx: usize,
    pub variant_idx: usize,
    pub idf_path: PathBuf,
    pub weather_path: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationOutput {
    pub metrics: BTreeMap<String, f64>,
    pub hourly_rows: usize,
    pub elapsed: Duration,
}

/// Why one variant produced no result. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobFailure {
    #[error("engine exited with {}: {log_tail}", exit_code(.code))]
    EngineExit { code: Option<i32>, log_tail: String },

    #[error("timed out after {}s", .after.as_secs())]
    TimedOut { after: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error("failed to start engine: {0}")]
    Spawn(String),

    #[error("missing results: {0}")]
    MissingResults(String),

    #[error("injection failed: {0}")]
    Injection(String),

    #[error("job panicked: {0}")]
    Panicked(String),
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "no exit code".to_string(), |c| format!("code {c}"))
}

impl JobFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            JobFailure::EngineExit { .. } => "engine_exit",
            JobFailure::TimedOut { .. } => "timed_out",
            JobFailure::Cancelled => "cancelled",
            JobFailure::Spawn(_) => "spawn",
            JobFailure::MissingResults(_) => "missing_results",
            JobFailure::Injection(_) => "injection",
            JobFailure::Panicked(_) => "panicked",
        }
    }
}

/// Runs one variant document to completion.
pub trait SimulationEngine: Send + Sync {
    /// Identity of the engine, folded into batch fingerprints.
    fn signature(&self) -> String;

    fn simulate(&self, job: &SimulationJob, cancel: &CancelToken) -> Result<SimulationOutput, JobFailure>;
}

/// Engine run as a child process per job.
#[derive(Debug, Clone)]
pub struct ExternalEngine {
    config: EngineConfig,
    poll_interval: Duration,
}

impl ExternalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Argument list with `{idf}`, `{weather}` and `{output_dir}` filled in.
    pub fn command_args(&self, job: &SimulationJob) -> Vec<String> {
        let idf = job.idf_path.display().to_string();
        let weather = job.weather_path.display().to_string();
        let output_dir = job.output_dir.display().to_string();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{idf}", &idf)
                    .replace("{weather}", &weather)
                    .replace("{output_dir}", &output_dir)
            })
            .collect()
    }

    fn wait_for_exit(
        &self,
        child: &mut std::process::Child,
        job: &SimulationJob,
        cancel: &CancelToken,
    ) -> Result<ExitStatus, JobFailure> {
        let started = Instant::now();
        let timeout = self.config.timeout();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(err) => {
                    stop(child);
                    return Err(JobFailure::Spawn(err.to_string()));
                }
            }
            if cancel.is_cancelled() {
                stop(child);
                tracing::debug!(idf = job.idf_idx, variant = job.variant_idx, "engine process cancelled");
                return Err(JobFailure::Cancelled);
            }
            if started.elapsed() >= timeout {
                stop(child);
                tracing::error!(
                    idf = job.idf_idx,
                    variant = job.variant_idx,
                    timeout_s = timeout.as_secs(),
                    "engine process timed out"
                );
                return Err(JobFailure::TimedOut { after: timeout });
            }
            thread::sleep(self.poll_interval);
        }
    }
}

fn stop(child: &mut std::process::Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn log_tail(path: &Path) -> String {
    let content = fs::read_to_string(path).unwrap_or_default();
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[start..].join("\n")
}

impl SimulationEngine for ExternalEngine {
    fn signature(&self) -> String {
        self.config.signature()
    }

    fn simulate(&self, job: &SimulationJob, cancel: &CancelToken) -> Result<SimulationOutput, JobFailure> {
        if cancel.is_cancelled() {
            return Err(JobFailure::Cancelled);
        }
        let io_failure = |err: std::io::Error| JobFailure::Spawn(err.to_string());
        fs::create_dir_all(&job.output_dir).map_err(io_failure)?;
        let stdout = File::create(job.output_dir.join(STDOUT_LOG)).map_err(io_failure)?;
        let stderr_path = job.output_dir.join(STDERR_LOG);
        let stderr = File::create(&stderr_path).map_err(io_failure)?;

        let started = Instant::now();
        let mut child = Command::new(&self.config.program)
            .args(self.command_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| JobFailure::Spawn(format!("{}: {}", self.config.program, e)))?;
        tracing::debug!(idf = job.idf_idx, variant = job.variant_idx, pid = child.id(), "engine started");

        let status = self.wait_for_exit(&mut child, job, cancel)?;
        if !status.success() {
            let failure = JobFailure::EngineExit {
                code: status.code(),
                log_tail: log_tail(&stderr_path),
            };
            tracing::error!(idf = job.idf_idx, variant = job.variant_idx, %failure, "engine failed");
            return Err(failure);
        }

        let bundle = read_bundle(&job.output_dir, &self.config.report_file, &self.config.timeseries_file)
            .map_err(|e| JobFailure::MissingResults(e.to_string()))?;
        Ok(SimulationOutput {
            metrics: bundle.metrics,
            hourly_rows: bundle.hourly_rows,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path) -> SimulationJob {
        SimulationJob {
            batch_id: BatchId::new(),
            idf_idx: 0,
            variant_idx: 3,
            idf_path: dir.join("in.idf"),
            weather_path: PathBuf::from("/weather/site.epw"),
            output_dir: dir.join("out"),
        }
    }

    #[test]
    fn placeholders_are_substituted() {
        let mut config = EngineConfig::new("sim");
        config.args = vec!["-w".into(), "{weather}".into(), "--out={output_dir}".into(), "{idf}".into()];
        let engine = ExternalEngine::new(config);
        let job = job(Path::new("/tmp/v3"));
        assert_eq!(
            engine.command_args(&job),
            vec!["-w", "/weather/site.epw", "--out=/tmp/v3/out", "/tmp/v3/in.idf"]
        );
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ExternalEngine::new(EngineConfig::new("/definitely/not/a/simulator"));
        let err = engine.simulate(&job(dir.path()), &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), "spawn");
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ExternalEngine::new(EngineConfig::new("sim"));
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(engine.simulate(&job(dir.path()), &cancel), Err(JobFailure::Cancelled));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn shell(script: &str, timeout_s: u64) -> ExternalEngine {
            let mut config = EngineConfig::new("sh");
            config.args = vec!["-c".into(), script.into()];
            config.timeout_s = timeout_s;
            ExternalEngine::new(config).with_poll_interval(Duration::from_millis(10))
        }

        #[test]
        fn successful_run_reads_bundle() {
            let dir = tempfile::tempdir().unwrap();
            let engine = shell(
                r#"printf '{"eui": 101.5}' > {output_dir}/summary.json; printf 'h,v\n1,2\n' > {output_dir}/timeseries.csv"#,
                10,
            );
            let output = engine.simulate(&job(dir.path()), &CancelToken::new()).unwrap();
            assert_eq!(output.metrics["eui"], 101.5);
            assert_eq!(output.hourly_rows, 1);
        }

        #[test]
        fn nonzero_exit_captures_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let engine = shell("echo 'fatal: severe error' >&2; exit 3", 10);
            match engine.simulate(&job(dir.path()), &CancelToken::new()) {
                Err(JobFailure::EngineExit { code, log_tail }) => {
                    assert_eq!(code, Some(3));
                    assert!(log_tail.contains("severe error"));
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        #[test]
        fn slow_run_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let engine = shell("sleep 5", 1);
            let started = Instant::now();
            let err = engine.simulate(&job(dir.path()), &CancelToken::new()).unwrap_err();
            assert_eq!(err, JobFailure::TimedOut { after: Duration::from_secs(1) });
            assert!(started.elapsed() < Duration::from_secs(4));
        }

        #[test]
        fn exit_zero_without_report_is_missing_results() {
            let dir = tempfile::tempdir().unwrap();
            let engine = shell("true", 10);
            let err = engine.simulate(&job(dir.path()), &CancelToken::new()).unwrap_err();
            assert_eq!(err.kind(), "missing_results");
        }
    }
}
