use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use ev_app::{AppError, AppResult, BatchConfig, ProgressEvent, batch_service};
use ev_core::{BatchId, BatchStatus};
use ev_construct::expected_variant_count;
use ev_results::VariantResultRow;

#[derive(Parser)]
#[command(name = "ev-cli")]
#[command(about = "Envariant CLI - construction variants and parallel envelope simulations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a batch config, its catalogue and documents
    Validate {
        /// Path to the batch config YAML file
        config_path: PathBuf,
    },
    /// List the construction sets a batch config expands to
    Expand {
        /// Path to the batch config YAML file
        config_path: PathBuf,
    },
    /// Inject one construction set into one document
    Inject {
        /// Document to modify
        document: PathBuf,
        /// Construction set file (.json, .yaml or .yml)
        construction_set: PathBuf,
        /// Output document (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run every variant of a batch config
    Run {
        /// Path to the batch config YAML file
        config_path: PathBuf,
    },
    /// List stored batches
    Batches {
        /// Results directory
        results_dir: PathBuf,
    },
    /// Show details of a stored batch
    ShowBatch {
        /// Results directory
        results_dir: PathBuf,
        /// Batch ID to display
        batch_id: String,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Expand { config_path } => cmd_expand(&config_path),
        Commands::Inject {
            document,
            construction_set,
            output,
        } => cmd_inject(&document, &construction_set, output.as_deref()),
        Commands::Run { config_path } => cmd_run(&config_path),
        Commands::Batches { results_dir } => cmd_batches(&results_dir),
        Commands::ShowBatch {
            results_dir,
            batch_id,
        } => cmd_show_batch(&results_dir, &batch_id),
    }
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating batch config: {}", config_path.display());
    let config = BatchConfig::load(config_path)?;
    let groups = batch_service::candidate_groups(&config)?;
    let variants = expected_variant_count(&groups, config.mode);
    if variants > config.max_variants {
        return Err(AppError::InvalidInput(format!(
            "{} variants exceed max_variants = {}",
            variants, config.max_variants
        )));
    }
    let documents = batch_service::load_documents(&config)?;
    println!("✓ Config is valid");
    println!("  Documents: {}", documents.len());
    println!("  Candidate constructions: {}", groups.total_rows());
    println!("  Variants: {} ({} simulations)", variants, variants * documents.len());
    Ok(())
}

fn cmd_expand(config_path: &Path) -> AppResult<()> {
    let config = BatchConfig::load(config_path)?;
    let sets = batch_service::expand_variants(&config)?;
    eprintln!("{} construction sets", sets.len());
    for set in &sets {
        let line = serde_json::to_string(set).map_err(|e| AppError::InvalidInput(e.to_string()))?;
        println!("{}", line);
    }
    Ok(())
}

fn cmd_inject(document: &Path, set_path: &Path, output: Option<&Path>) -> AppResult<()> {
    let report = batch_service::inject_file(document, set_path, output)?;

    println!("✓ Injected {}", set_path.display());
    for (element, name) in &report.constructions_created {
        println!("  {:<7} {} ({} assigned)", element, name, report.assigned(*element));
    }
    if !report.materials_created.is_empty() {
        println!("  Default materials: {}", report.materials_created.join(", "));
    }
    if !report.pruned_constructions.is_empty() {
        println!("  Pruned: {}", report.pruned_constructions.join(", "));
    }
    if report.remapped_references > 0 {
        println!("  Remapped references: {}", report.remapped_references);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

fn cmd_run(config_path: &Path) -> AppResult<()> {
    let config = BatchConfig::load(config_path)?;
    let plan = batch_service::plan_batch(&config)?;
    println!(
        "Running batch '{}': {} documents x {} construction sets",
        plan.name,
        plan.documents.len(),
        plan.construction_sets.len()
    );

    let orchestrator = batch_service::orchestrator_for(&config)?;
    let events = orchestrator.tracker().subscribe();
    let started = Instant::now();
    let handle = orchestrator.dispatch(plan.request())?;
    let batch_id = handle.id();
    tracing::info!(%batch_id, "dispatched batch");

    loop {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(event) if event.batch_id == batch_id => {
                render_cli_progress(&event, started);
                if event.is_terminal() {
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                if handle.is_finished() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let run = handle.wait()?;
    clear_progress_line();

    println!("Batch {} {} in {:.1}s", run.id, run.status(), started.elapsed().as_secs_f64());
    let store = batch_service::open_store(&config)?;
    if let Ok(manifest) = store.load_manifest(batch_id) {
        println!("  Rows persisted: {}", manifest.rows_persisted);
        println!("  Failed variants: {}", manifest.failures.len());
    }

    match run.status() {
        BatchStatus::Completed => Ok(()),
        _ => Err(AppError::BatchFailed {
            id: run.id,
            message: run.error_message().unwrap_or("unknown error").to_string(),
        }),
    }
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &ProgressEvent, started: Instant) {
    let width = 28usize;
    let filled = ((event.progress as usize * width) / 100).min(width);
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(width - filled));
    let mut line = format!(
        "\r[{}] {:>3}%  status={}  elapsed={:.1}s",
        bar,
        event.progress,
        event.status,
        started.elapsed().as_secs_f64()
    );
    if let Some(msg) = &event.message {
        line.push_str(&format!("  {}", msg));
    }
    print!("{}", line);
    let _ = io::stdout().flush();
}

fn cmd_batches(results_dir: &Path) -> AppResult<()> {
    let store = ev_results::JsonlResultStore::new(results_dir.to_path_buf())?;
    let manifests = store.list_batches()?;

    if manifests.is_empty() {
        println!("No batches found in {}", results_dir.display());
    } else {
        println!("Batches in {}:", results_dir.display());
        for manifest in manifests {
            println!(
                "  {} {:<10} {:>4}/{:<4} {} ({})",
                manifest.run.id,
                manifest.run.status(),
                manifest.rows_persisted,
                manifest.run.total_variants,
                manifest.run.name,
                manifest.run.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    Ok(())
}

fn cmd_show_batch(results_dir: &Path, batch_id: &str) -> AppResult<()> {
    let batch_id: BatchId = batch_id
        .parse()
        .map_err(|e| AppError::InvalidInput(format!("invalid batch id '{}': {}", batch_id, e)))?;
    let store = ev_results::JsonlResultStore::new(results_dir.to_path_buf())?;
    let manifest = store.load_manifest(batch_id)?;
    let rows = store.load_rows(batch_id)?;

    println!("\nBatch Summary:");
    println!("  Name: {}", manifest.run.name);
    println!("  Status: {}", manifest.run.status());
    if let Some(message) = manifest.run.error_message() {
        println!("  Error: {}", message);
    }
    println!("  Progress: {}%", manifest.run.progress());
    println!("  Variants: {}", manifest.run.total_variants);
    println!("  Rows stored: {}", rows.len());
    println!("  Fingerprint: {}", manifest.fingerprint);

    let ranges = metric_ranges(&rows);
    if !ranges.is_empty() {
        println!("\nMetrics (min .. max):");
        for (metric, (min, max)) in ranges {
            println!("  {:<24} {:.3} .. {:.3}", metric, min, max);
        }
    }

    if !manifest.failures.is_empty() {
        println!("\nFailures:");
        for failure in &manifest.failures {
            println!(
                "  d{}_v{} [{}] {}: {}",
                failure.idf_idx, failure.variant_idx, failure.kind, failure.label, failure.message
            );
        }
    }
    Ok(())
}

fn metric_ranges(rows: &[VariantResultRow]) -> BTreeMap<&str, (f64, f64)> {
    let mut ranges: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in rows {
        for (metric, value) in &row.metrics {
            let entry = ranges.entry(metric.as_str()).or_insert((*value, *value));
            entry.0 = entry.0.min(*value);
            entry.1 = entry.1.max(*value);
        }
    }
    ranges
}
