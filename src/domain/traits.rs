// ============================================================
// Layer 3 - Core Traits
// ============================================================
// The watcher never talks to a training library directly. It
// hands a RetrainRun to something that implements Trainer:
//
//   - YoloTrainer        -> spawns the Ultralytics `yolo` CLI
//   - tests' FakeTrainer -> records the runs it was given
//
// Keeping this seam here means the whole poll loop can be
// exercised in tests without a GPU or a Python install.

use anyhow::Result;

use crate::domain::retrain::{RetrainOutcome, RetrainRun};

// ─── Trainer ─────────────────────────────────────────────────────────────────
/// The external training collaborator.
///
/// `train` blocks until the run finishes. Any error is fatal to the
/// watcher; implementations must not retry on their own.
pub trait Trainer {
    fn train(&self, run: &RetrainRun) -> Result<RetrainOutcome>;
}

impl<T: Trainer + ?Sized> Trainer for &T {
    fn train(&self, run: &RetrainRun) -> Result<RetrainOutcome> {
        (**self).train(run)
    }
}
