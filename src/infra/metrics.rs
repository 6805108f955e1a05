// ============================================================
// Layer 6 - Retrain Metrics
// ============================================================
// Two jobs:
//
//   1. Read the collaborator's per-epoch results.csv and keep
//      the LAST row as the run's final metrics.
//
//        epoch,  train/seg_loss, metrics/mAP50(M), ...
//        1,      1.93,           0.21,             ...
//        50,     0.41,           0.88,             ...   <- kept
//
//   2. Append one JSON line per finished run to
//      <project_dir>/finetune_history.jsonl so incremental
//      fine-tunes can be compared over time.
//
// Missing files, columns or unparsable cells are not errors:
// the watcher reports whatever is there.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::retrain::{Device, MetricMap, RetrainOutcome, RetrainRun};

/// Parse results.csv text into the metrics of its last row.
pub fn parse_results_csv(text: &str) -> MetricMap {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let Some(header) = lines.next() else {
        return MetricMap::new();
    };
    let Some(last) = lines.last() else {
        return MetricMap::new();
    };

    header
        .split(',')
        .map(str::trim)
        .zip(last.split(',').map(str::trim))
        .filter(|(key, _)| !key.is_empty())
        .filter_map(|(key, value)| value.parse::<f64>().ok().map(|v| (key.to_string(), v)))
        .collect()
}

/// Read `<run_dir>/results.csv`; an absent file yields no metrics.
pub fn read_results_csv(path: &Path) -> Result<MetricMap> {
    if !path.exists() {
        tracing::debug!("No results file at '{}'", path.display());
        return Ok(MetricMap::new());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read results '{}'", path.display()))?;
    Ok(parse_results_csv(&text))
}

/// One line of the retrain history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub run: String,
    pub finished_at: String,
    pub epochs: u32,
    pub device: Device,
    pub batch: u32,
    pub base_weights: PathBuf,
    pub metrics: MetricMap,
}

impl HistoryRecord {
    pub fn new(run: &RetrainRun, outcome: &RetrainOutcome) -> Self {
        Self {
            run: run.name.clone(),
            finished_at: Local::now().to_rfc3339(),
            epochs: run.epochs,
            device: run.device,
            batch: run.batch,
            base_weights: run.base_weights.clone(),
            metrics: outcome.metrics.clone(),
        }
    }
}

/// Append-only JSON-lines log of finished retrain runs.
pub struct RetrainHistory {
    path: PathBuf,
}

impl RetrainHistory {
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            path: project_dir.as_ref().join("finetune_history.jsonl"),
        }
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        }

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open history '{}'", self.path.display()))?;
        writeln!(f, "{}", serde_json::to_string(record)?)?;

        tracing::debug!("Recorded run {} in '{}'", record.run, self.path.display());
        Ok(())
    }
}
