//! Batch configuration loaded from YAML.
//!
//! ```yaml
//! name: envelope-study
//! documents: [models/office.idf]
//! weather: weather/site.epw
//! catalogue: catalogue.yaml
//! candidates:
//!   wall: [W2, W3]
//!   window: [G1]
//! mode: combinatorial
//! engine:
//!   program: energyplus
//!   args: ["-w", "{weather}", "-d", "{output_dir}", "{idf}"]
//!   timeout_s: 1800
//! workers: 4
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ev_construct::ExpandMode;
use ev_core::{ElementType, ValidationError, ValidationResult};
use ev_results::bundle::{DEFAULT_REPORT_FILE, DEFAULT_TIMESERIES_FILE};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub name: String,
    pub documents: Vec<PathBuf>,
    pub weather: PathBuf,
    pub catalogue: PathBuf,
    /// Catalogue names per element; empty means the whole catalogue.
    #[serde(default)]
    pub candidates: BTreeMap<ElementType, Vec<String>>,
    #[serde(default)]
    pub mode: ExpandMode,
    #[serde(default = "default_max_variants")]
    pub max_variants: usize,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    pub engine: EngineConfig,
    /// Worker threads; the pool picks a default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub program: String,
    /// Argument templates; `{idf}`, `{weather}` and `{output_dir}` are substituted.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "default_report_file")]
    pub report_file: String,
    #[serde(default = "default_timeseries_file")]
    pub timeseries_file: String,
}

impl EngineConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_s: default_timeout_s(),
            report_file: default_report_file(),
            timeseries_file: default_timeseries_file(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }

    /// Identity of the invocation, folded into batch fingerprints.
    pub fn signature(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

fn default_max_variants() -> usize {
    500
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_timeout_s() -> u64 {
    3600
}

fn default_report_file() -> String {
    DEFAULT_REPORT_FILE.to_string()
}

fn default_timeseries_file() -> String {
    DEFAULT_TIMESERIES_FILE.to_string()
}

impl BatchConfig {
    /// Load, resolve relative paths against the file's directory, validate.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_str(&content, base_dir)
    }

    pub fn from_yaml_str(content: &str, base_dir: &Path) -> AppResult<Self> {
        let mut config: BatchConfig = serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse batch config YAML: {}", e)))?;
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };
        self.documents.iter_mut().for_each(resolve);
        resolve(&mut self.weather);
        resolve(&mut self.catalogue);
        resolve(&mut self.work_dir);
        resolve(&mut self.results_dir);
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", &self.name, "must not be empty"));
        }
        if self.documents.is_empty() {
            return Err(ValidationError::Empty {
                what: "batch config lists no documents".to_string(),
            });
        }
        if self.max_variants == 0 {
            return Err(invalid("max_variants", "0", "must be at least 1"));
        }
        if self.workers == Some(0) {
            return Err(invalid("workers", "0", "must be at least 1"));
        }
        for (element, names) in &self.candidates {
            if names.iter().any(|n| n.trim().is_empty()) {
                return Err(invalid(
                    &format!("candidates.{element}"),
                    "",
                    "candidate names must not be blank",
                ));
            }
        }
        if self.engine.program.trim().is_empty() {
            return Err(invalid("engine.program", "", "must not be empty"));
        }
        if self.engine.timeout_s == 0 {
            return Err(invalid("engine.timeout_s", "0", "must be at least 1"));
        }
        if self.engine.report_file.trim().is_empty() {
            return Err(invalid("engine.report_file", "", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
