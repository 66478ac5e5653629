//! Reading the files an engine leaves in a variant's output directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::{ResultsError, ResultsResult};

pub const DEFAULT_REPORT_FILE: &str = "summary.json";
pub const DEFAULT_TIMESERIES_FILE: &str = "timeseries.csv";

/// Metrics and time series size of one finished simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultBundle {
    pub metrics: BTreeMap<String, f64>,
    /// Data rows in the time series file, header excluded.
    pub hourly_rows: usize,
}

/// Read `<output_dir>/<report_file>` and, when present, count the rows of
/// `<output_dir>/<timeseries_file>`.
///
/// The report must be a flat JSON object; non-numeric entries are skipped.
pub fn read_bundle(output_dir: &Path, report_file: &str, timeseries_file: &str) -> ResultsResult<ResultBundle> {
    let report_path = output_dir.join(report_file);
    if !report_path.exists() {
        return Err(ResultsError::MissingReport { path: report_path });
    }

    let content = fs::read_to_string(&report_path)?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| ResultsError::MalformedReport {
            path: report_path.clone(),
            message: e.to_string(),
        })?;
    let serde_json::Value::Object(entries) = value else {
        return Err(ResultsError::MalformedReport {
            path: report_path,
            message: "expected a JSON object of metrics".to_string(),
        });
    };

    let mut metrics = BTreeMap::new();
    for (key, value) in entries {
        match value.as_f64() {
            Some(number) => {
                metrics.insert(key, number);
            }
            None => tracing::warn!(metric = %key, path = %report_path.display(), "ignoring non-numeric metric"),
        }
    }

    let timeseries_path = output_dir.join(timeseries_file);
    let hourly_rows = if timeseries_path.exists() {
        fs::read_to_string(&timeseries_path)?
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .count()
    } else {
        0
    };

    Ok(ResultBundle {
        metrics,
        hourly_rows,
    })
}
