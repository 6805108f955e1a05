// ============================================================
// Layer 2 - RetrainUseCase
// ============================================================
// Turns the three operator knobs into a RetrainRun and hands it
// to the training collaborator:
//
//   Step 1: Pick base weights (latest best.pt, else pretrained)
//   Step 2: Name the run finetune_<timestamp>
//   Step 3: Block on the collaborator
//   Step 4: Report key metrics and record the run in history
//
// There is no metric gating. A collaborator error is returned
// unchanged to the caller.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::PathBuf;

use crate::application::watch_use_case::WatchConfig;
use crate::domain::retrain::{RetrainOutcome, RetrainRun};
use crate::domain::traits::Trainer;
use crate::infra::metrics::{HistoryRecord, RetrainHistory};

const BANNER: &str = "==============================================================";

pub struct RetrainUseCase<'a> {
    config: &'a WatchConfig,
}

impl<'a> RetrainUseCase<'a> {
    pub fn new(config: &'a WatchConfig) -> Self {
        Self { config }
    }

    /// Prefer the weights of the last full training run if present.
    pub fn base_weights(&self) -> PathBuf {
        let cfg = self.config;
        if cfg.base_weights.exists() {
            tracing::info!("Loading base weights from {}", cfg.base_weights.display());
            cfg.base_weights.clone()
        } else {
            tracing::info!(
                "Base weights not found; using {}",
                cfg.fallback_weights.display()
            );
            cfg.fallback_weights.clone()
        }
    }

    /// Build the run description for a request made at `now`
    pub fn plan(&self, now: DateTime<Local>) -> RetrainRun {
        let cfg = self.config;
        RetrainRun {
            name: RetrainRun::name_at(now),
            epochs: cfg.epochs,
            device: cfg.device,
            batch: cfg.batch,
            base_weights: self.base_weights(),
            data_yaml: cfg.data_yaml.clone(),
            project_dir: cfg.project_dir.clone(),
        }
    }

    pub fn execute<T: Trainer>(&self, trainer: &T) -> Result<RetrainOutcome> {
        let run = self.plan(Local::now());

        println!("\n{BANNER}");
        println!("Starting fine-tuning on augmented training set");
        println!("{BANNER}");
        tracing::info!(
            "Run {}: epochs={}, batch={}, device={}",
            run.name,
            run.epochs,
            run.batch,
            run.device
        );

        let outcome = trainer.train(&run)?;

        println!("\n{BANNER}");
        println!("Fine-tuning complete");
        println!("{BANNER}");
        println!("Run directory: {}", outcome.run_dir.display());

        let key_metrics = outcome.key_metrics();
        if !key_metrics.is_empty() {
            println!("\nKey metrics (validation):");
            for (key, value) in key_metrics {
                println!("  {key}: {value:.4}");
            }
        }

        // History is a convenience; losing a line must not stop the watcher
        let history = RetrainHistory::new(&run.project_dir);
        if let Err(e) = history.append(&HistoryRecord::new(&run, &outcome)) {
            tracing::warn!("Could not record run {}: {:#}", run.name, e);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrain::Device;
    use anyhow::bail;
    use chrono::TimeZone;
    use std::{cell::RefCell, fs};
    use tempfile::TempDir;

    struct Recording {
        runs: RefCell<Vec<RetrainRun>>,
    }

    impl Trainer for Recording {
        fn train(&self, run: &RetrainRun) -> Result<RetrainOutcome> {
            self.runs.borrow_mut().push(run.clone());
            let mut outcome = RetrainOutcome {
                run_dir: run.run_dir(),
                ..Default::default()
            };
            outcome.metrics.insert("metrics/mAP50(M)".into(), 0.81);
            Ok(outcome)
        }
    }

    struct Failing;

    impl Trainer for Failing {
        fn train(&self, _run: &RetrainRun) -> Result<RetrainOutcome> {
            bail!("CUDA out of memory")
        }
    }

    fn config(root: &std::path::Path) -> WatchConfig {
        WatchConfig {
            base_weights: root.join("runs/segment/transformer_fault_best/weights/best.pt"),
            project_dir: root.join("runs/segment"),
            ..WatchConfig::default()
        }
    }

    #[test]
    fn test_falls_back_to_pretrained_weights() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());
        assert_eq!(RetrainUseCase::new(&cfg).base_weights(), PathBuf::from("yolov8x-seg.pt"));
    }

    #[test]
    fn test_prefers_existing_best_weights() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());
        fs::create_dir_all(cfg.base_weights.parent().unwrap()).unwrap();
        fs::write(&cfg.base_weights, b"weights").unwrap();

        assert_eq!(RetrainUseCase::new(&cfg).base_weights(), cfg.base_weights);
    }

    #[test]
    fn test_plan_uses_operator_knobs() {
        let tmp = TempDir::new().unwrap();
        let cfg = WatchConfig {
            epochs: 12,
            batch: 4,
            device: Device::Cpu,
            ..config(tmp.path())
        };
        let now = Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let run = RetrainUseCase::new(&cfg).plan(now);

        assert_eq!(run.name, "finetune_20250601_120000");
        assert_eq!((run.epochs, run.batch, run.device), (12, 4, Device::Cpu));
        assert_eq!(run.run_dir(), tmp.path().join("runs/segment/finetune_20250601_120000"));
    }

    #[test]
    fn test_execute_records_history() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());
        let trainer = Recording { runs: RefCell::new(Vec::new()) };

        let outcome = RetrainUseCase::new(&cfg).execute(&trainer).unwrap();

        assert_eq!(trainer.runs.borrow().len(), 1);
        assert_eq!(outcome.key_metrics(), vec![("metrics/mAP50(M)", 0.81)]);
        let history = fs::read_to_string(tmp.path().join("runs/segment/finetune_history.jsonl")).unwrap();
        assert_eq!(history.lines().count(), 1);
    }

    #[test]
    fn test_collaborator_error_propagates() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());

        let err = RetrainUseCase::new(&cfg).execute(&Failing).unwrap_err();

        assert!(err.to_string().contains("out of memory"));
        assert!(!tmp.path().join("runs/segment/finetune_history.jsonl").exists());
    }
}
