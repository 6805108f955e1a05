// ============================================================
// Layer 5 - Training Collaborator (Ultralytics CLI)
// ============================================================
// Fine-tuning itself is delegated to the `yolo` command line:
//
//   yolo segment train model=<weights> data=data/data.yaml \
//        epochs=50 batch=8 device=cuda project=runs/segment \
//        name=finetune_20240309_070501 optimizer=AdamW lr0=0.0001 ...
//
// The process inherits stdout/stderr so its progress bars show
// up in the watcher's terminal. The call blocks until the run
// ends; there is no timeout.
//
// Hyperparameters are a fixed profile tuned for small
// incremental updates (low lr0, lighter mosaic and scale than a
// from-scratch run). Only epochs feeds into it.

use anyhow::{bail, Context, Result};
use std::{
    path::PathBuf,
    process::Command,
};

use crate::domain::retrain::{RetrainOutcome, RetrainRun};
use crate::domain::traits::Trainer;
use crate::infra::metrics::read_results_csv;

// ─── Fine-tuning profile ─────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct FinetuneProfile {
    pub imgsz: u32,
    pub optimizer: &'static str,
    pub lr0: f64,
    pub lrf: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub patience: u32,
    pub warmup_epochs: u32,
    pub warmup_momentum: f64,
    pub close_mosaic: u32,

    // augmentation
    pub hsv_h: f64,
    pub hsv_s: f64,
    pub hsv_v: f64,
    pub translate: f64,
    pub scale: f64,
    pub shear: f64,
    pub perspective: f64,
    pub flipud: f64,
    pub fliplr: f64,
    pub mosaic: f64,
    pub mixup: f64,
    pub copy_paste: f64,

    pub seed: u64,
    pub save_period: u32,
    pub fraction: f64,
}

impl FinetuneProfile {
    pub fn for_epochs(epochs: u32) -> Self {
        Self {
            imgsz: 640,
            optimizer: "AdamW",
            lr0: 0.0001,
            lrf: 0.01,
            momentum: 0.937,
            weight_decay: 0.0005,
            patience: (epochs / 2).max(20),
            warmup_epochs: (epochs / 10).clamp(1, 3),
            warmup_momentum: 0.8,
            close_mosaic: (epochs / 5).clamp(1, 10),

            hsv_h: 0.015,
            hsv_s: 0.7,
            hsv_v: 0.4,
            translate: 0.1,
            scale: 0.3,
            shear: 0.0,
            perspective: 0.0,
            flipud: 0.0,
            fliplr: 0.5,
            mosaic: 0.5,
            mixup: 0.0,
            copy_paste: 0.0,

            seed: 42,
            save_period: 5,
            fraction: 1.0,
        }
    }

    /// `key=value` arguments in the form the `yolo` CLI expects
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("imgsz={}", self.imgsz),
            format!("optimizer={}", self.optimizer),
            format!("lr0={}", self.lr0),
            format!("lrf={}", self.lrf),
            format!("momentum={}", self.momentum),
            format!("weight_decay={}", self.weight_decay),
            format!("patience={}", self.patience),
            format!("warmup_epochs={}", self.warmup_epochs),
            format!("warmup_momentum={}", self.warmup_momentum),
            format!("close_mosaic={}", self.close_mosaic),
            format!("hsv_h={}", self.hsv_h),
            format!("hsv_s={}", self.hsv_s),
            format!("hsv_v={}", self.hsv_v),
            format!("translate={}", self.translate),
            format!("scale={}", self.scale),
            format!("shear={}", self.shear),
            format!("perspective={}", self.perspective),
            format!("flipud={}", self.flipud),
            format!("fliplr={}", self.fliplr),
            format!("mosaic={}", self.mosaic),
            format!("mixup={}", self.mixup),
            format!("copy_paste={}", self.copy_paste),
            format!("seed={}", self.seed),
            format!("save_period={}", self.save_period),
            format!("fraction={}", self.fraction),
        ];
        args.extend(
            [
                "deterministic=True",
                "cos_lr=True",
                "amp=True",
                "save=True",
                "val=True",
                "plots=True",
                "verbose=True",
                "exist_ok=True",
            ]
            .map(String::from),
        );
        args
    }
}

// ─── YoloTrainer ─────────────────────────────────────────────────────────────
/// Runs `yolo segment train` as a blocking child process.
pub struct YoloTrainer {
    bin: PathBuf,
}

impl YoloTrainer {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Full argument list for one run
    pub fn command_args(run: &RetrainRun) -> Vec<String> {
        let mut args = vec![
            "segment".to_string(),
            "train".to_string(),
            format!("model={}", run.base_weights.display()),
            format!("data={}", run.data_yaml.display()),
            format!("epochs={}", run.epochs),
            format!("batch={}", run.batch),
            format!("device={}", run.device),
            format!("project={}", run.project_dir.display()),
            format!("name={}", run.name),
        ];
        args.extend(FinetuneProfile::for_epochs(run.epochs).args());
        args
    }
}

impl Trainer for YoloTrainer {
    fn train(&self, run: &RetrainRun) -> Result<RetrainOutcome> {
        let args = Self::command_args(run);
        tracing::debug!("{} {}", self.bin.display(), args.join(" "));

        let status = Command::new(&self.bin)
            .args(&args)
            .status()
            .with_context(|| {
                format!("Cannot launch training command '{}'", self.bin.display())
            })?;

        if !status.success() {
            bail!("Training run '{}' failed: {}", run.name, status);
        }

        let run_dir = run.run_dir();
        let metrics = read_results_csv(&run_dir.join("results.csv"))?;
        Ok(RetrainOutcome { run_dir, metrics })
    }
}
