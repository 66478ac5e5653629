//! Durable batch storage: one directory per batch holding
//! `results.jsonl` and `manifest.json`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use ev_core::BatchId;

use crate::sink::ResultSink;
use crate::types::{BatchManifest, VariantResultRow};
use crate::{ResultsError, ResultsResult};

const ROWS_FILE: &str = "results.jsonl";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct JsonlResultStore {
    root_dir: PathBuf,
}

impl JsonlResultStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &PathBuf {
        &self.root_dir
    }

    fn batch_dir(&self, batch_id: BatchId) -> PathBuf {
        self.root_dir.join(batch_id.to_string())
    }

    pub fn has_batch(&self, batch_id: BatchId) -> bool {
        self.batch_dir(batch_id).join(MANIFEST_FILE).exists()
    }

    pub fn save_manifest(&self, manifest: &BatchManifest) -> ResultsResult<()> {
        let batch_dir = self.batch_dir(manifest.run.id);
        fs::create_dir_all(&batch_dir)?;

        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(batch_dir.join(MANIFEST_FILE), manifest_json)?;
        Ok(())
    }

    pub fn load_manifest(&self, batch_id: BatchId) -> ResultsResult<BatchManifest> {
        let manifest_path = self.batch_dir(batch_id).join(MANIFEST_FILE);

        if !manifest_path.exists() {
            return Err(ResultsError::BatchNotFound {
                batch_id: batch_id.to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Every stored row of a batch; unparseable lines are skipped.
    pub fn load_rows(&self, batch_id: BatchId) -> ResultsResult<Vec<VariantResultRow>> {
        let rows_path = self.batch_dir(batch_id).join(ROWS_FILE);
        if !rows_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(rows_path)?;
        let mut rows = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<VariantResultRow>(line) {
                Ok(row) if row.batch_id == batch_id => rows.push(row),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%batch_id, line = line_no + 1, error = %err, "skipping unreadable result row");
                }
            }
        }
        Ok(rows)
    }

    /// Manifests of every stored batch, oldest first.
    pub fn list_batches(&self) -> ResultsResult<Vec<BatchManifest>> {
        let mut batches = Vec::new();

        if !self.root_dir.exists() {
            return Ok(batches);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Ok(batch_id) = name.parse::<BatchId>() else {
                continue;
            };
            if let Ok(manifest) = self.load_manifest(batch_id) {
                batches.push(manifest);
            }
        }

        batches.sort_by_key(|m| m.run.created_at);
        Ok(batches)
    }

    pub fn delete_batch(&self, batch_id: BatchId) -> ResultsResult<()> {
        let batch_dir = self.batch_dir(batch_id);
        if batch_dir.exists() {
            fs::remove_dir_all(batch_dir)?;
        }
        Ok(())
    }
}

impl ResultSink for JsonlResultStore {
    fn insert_rows(&self, batch_id: BatchId, rows: &[VariantResultRow]) -> ResultsResult<usize> {
        let batch_dir = self.batch_dir(batch_id);
        fs::create_dir_all(&batch_dir)?;

        let mut content = String::new();
        for row in rows {
            content.push_str(&serde_json::to_string(row)?);
            content.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(batch_dir.join(ROWS_FILE))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        tracing::debug!(%batch_id, rows = rows.len(), "appended result rows");
        Ok(rows.len())
    }

    fn count(&self, batch_id: BatchId) -> ResultsResult<usize> {
        Ok(self.load_rows(batch_id)?.len())
    }
}
