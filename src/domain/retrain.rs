// ============================================================
// Layer 3 - Retraining Domain Types
// ============================================================
// A RetrainRun is everything the training collaborator needs for
// one fine-tuning invocation. Only three knobs come from the
// operator (epochs, device, batch); the rest of the hyperparameter
// profile is fixed policy and lives in the ml layer.

use std::{collections::BTreeMap, fmt, path::PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Compute device passed through to the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric name -> value, as reported by the collaborator.
/// Any key may be absent; absence is never an error.
pub type MetricMap = BTreeMap<String, f64>;

/// The segmentation-mask validation metrics shown after a run.
pub const KEY_METRICS: [&str; 4] = [
    "metrics/mAP50(M)",
    "metrics/mAP50-95(M)",
    "metrics/precision(M)",
    "metrics/recall(M)",
];

/// One fine-tuning invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainRun {
    /// finetune_<YYYYMMDD_HHMMSS>
    pub name: String,
    pub epochs: u32,
    pub device: Device,
    pub batch: u32,
    /// Weights file (or pretrained identifier) to start from
    pub base_weights: PathBuf,
    /// Dataset descriptor handed to the collaborator
    pub data_yaml: PathBuf,
    /// Parent directory of all runs
    pub project_dir: PathBuf,
}

impl RetrainRun {
    /// Run name derived from the local time the run was requested.
    pub fn name_at(now: DateTime<Local>) -> String {
        format!("finetune_{}", now.format("%Y%m%d_%H%M%S"))
    }

    /// Directory the collaborator writes this run's outputs into
    pub fn run_dir(&self) -> PathBuf {
        self.project_dir.join(&self.name)
    }
}

/// What came back from a completed run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetrainOutcome {
    pub run_dir: PathBuf,
    pub metrics: MetricMap,
}

impl RetrainOutcome {
    /// The key metrics that are present, in display order
    pub fn key_metrics(&self) -> Vec<(&'static str, f64)> {
        KEY_METRICS
            .iter()
            .filter_map(|k| self.metrics.get(*k).map(|v| (*k, *v)))
            .collect()
    }
}
