//! Turning a batch config into documents, variants and a dispatchable
//! request, plus the single-document injection used by the CLI.

use std::path::Path;
use std::sync::Arc;

use ev_construct::{
    CandidateGroups, ChangeReport, Injector, YamlCatalogue, expand_limited, resolve_candidates,
};
use ev_core::{ConstructionSet, ValidationError};
use ev_idf::Document;
use ev_results::JsonlResultStore;

use crate::config::BatchConfig;
use crate::engine::ExternalEngine;
use crate::error::{AppError, AppResult};
use crate::orchestrator::{BatchRequest, Orchestrator, OrchestratorSettings};

/// Documents and variants ready to dispatch.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub name: String,
    pub documents: Vec<Document>,
    pub construction_sets: Vec<ConstructionSet>,
    pub weather: std::path::PathBuf,
}

impl BatchPlan {
    pub fn total_variants(&self) -> usize {
        self.documents.len() * self.construction_sets.len()
    }

    pub fn request(&self) -> BatchRequest {
        BatchRequest {
            name: self.name.clone(),
            documents: self.documents.clone(),
            construction_sets: self.construction_sets.clone(),
            weather: self.weather.clone(),
        }
    }
}

/// Parse every document the config lists, in order.
pub fn load_documents(config: &BatchConfig) -> AppResult<Vec<Document>> {
    config
        .documents
        .iter()
        .map(|path| {
            let doc = Document::read_file(path)?;
            tracing::debug!(path = %path.display(), objects = doc.len(), "loaded document");
            Ok(doc)
        })
        .collect()
}

/// Candidate constructions per element: the named ones, or the whole
/// catalogue when the config names none.
pub fn candidate_groups(config: &BatchConfig) -> AppResult<CandidateGroups> {
    let catalogue = YamlCatalogue::load(&config.catalogue)?;
    let groups = if config.candidates.is_empty() {
        catalogue.all_candidates()
    } else {
        resolve_candidates(&catalogue, &config.candidates)?
    };
    if groups.is_empty() {
        return Err(ValidationError::Empty {
            what: format!("no candidate constructions in {}", config.catalogue.display()),
        }
        .into());
    }
    Ok(groups)
}

/// Expand the config's candidates into validated construction sets.
pub fn expand_variants(config: &BatchConfig) -> AppResult<Vec<ConstructionSet>> {
    let groups = candidate_groups(config)?;
    let sets = expand_limited(&groups, config.mode, config.max_variants)?;
    for set in &sets {
        set.validate()?;
    }
    Ok(sets)
}

/// Load and expand everything a batch needs, without touching the disk
/// beyond reading inputs.
pub fn plan_batch(config: &BatchConfig) -> AppResult<BatchPlan> {
    let construction_sets = expand_variants(config)?;
    if construction_sets.is_empty() {
        return Err(AppError::InvalidInput("expansion produced no variants".to_string()));
    }
    let documents = load_documents(config)?;
    if !config.weather.exists() {
        return Err(AppError::InvalidInput(format!(
            "weather file not found: {}",
            config.weather.display()
        )));
    }

    let plan = BatchPlan {
        name: config.name.clone(),
        documents,
        construction_sets,
        weather: config.weather.clone(),
    };
    tracing::info!(
        name = %plan.name,
        documents = plan.documents.len(),
        sets = plan.construction_sets.len(),
        variants = plan.total_variants(),
        "planned batch"
    );
    Ok(plan)
}

/// Result store rooted at the config's results directory.
pub fn open_store(config: &BatchConfig) -> AppResult<JsonlResultStore> {
    Ok(JsonlResultStore::new(config.results_dir.clone())?)
}

/// Orchestrator wired the way a config describes: external engine,
/// durable store as both sink and manifest store.
pub fn orchestrator_for(config: &BatchConfig) -> AppResult<Orchestrator> {
    let store = open_store(config)?;
    let mut settings = OrchestratorSettings::new(config.work_dir.clone());
    settings.workers = config.workers;
    let orchestrator = Orchestrator::new(
        settings,
        Arc::new(ExternalEngine::new(config.engine.clone())),
        Arc::new(store.clone()),
    )?
    .with_manifest_store(store);
    Ok(orchestrator)
}

/// Read a construction set; `.yaml`/`.yml` files are YAML, anything else JSON.
pub fn load_construction_set(path: &Path) -> AppResult<ConstructionSet> {
    let text = std::fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    let set = if is_yaml {
        serde_yaml::from_str::<ConstructionSet>(&text).map_err(|e| ValidationError::Malformed(e.to_string()))?
    } else {
        ConstructionSet::from_json_str(&text)?
    };
    Ok(set)
}

/// Inject one construction set into one document file, writing the result
/// to `output` (or back over `document` when `None`).
pub fn inject_file(document: &Path, set_path: &Path, output: Option<&Path>) -> AppResult<ChangeReport> {
    let set = load_construction_set(set_path)?;
    let mut doc = Document::read_file(document)?;
    let report = Injector::new().inject(&mut doc, &set)?;
    for warning in &report.warnings {
        tracing::warn!(%warning, "injection warning");
    }
    let target = output.unwrap_or(document);
    doc.write_file(target)?;
    tracing::info!(
        document = %document.display(),
        output = %target.display(),
        constructions = report.constructions_created.len(),
        "injected construction set"
    );
    Ok(report)
}
