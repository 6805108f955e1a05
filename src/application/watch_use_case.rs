// ============================================================
// Layer 2 - Watch Use Case
// ============================================================
// The ingestion poll loop.
//
//            +------------------------------+
//            v                              |
//   [Idle] --tick--> [Processing] --batch--+   (no sleep: fast drain)
//      ^                  |
//      +--- sleep <-- nothing found
//
// One poll cycle:
//   Step 1: Scan staging for image/label pairs     (Layer 4)
//   Step 2: Move them into the training split      (Layer 4)
//   Step 3: Drop the stale label cache             (Layer 4)
//   Step 4: Fine-tune unless --move-only           (Layer 2/5)
//
// Shutdown is only observed between cycles and during the idle
// sleep. A batch that has started moving, or a training run that
// has started, is never cut short by the watcher itself.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::application::retrain_use_case::RetrainUseCase;
use crate::data::{
    mover::CorpusMover,
    scanner::{ScanReport, StagingScanner},
};
use crate::domain::retrain::{Device, RetrainOutcome};
use crate::domain::sample::{CorpusEntry, StagingSample};
use crate::domain::traits::Trainer;
use crate::infra::shutdown::Shutdown;

// ─── Watch Configuration ─────────────────────────────────────────────────────
// All paths are relative to the working directory unless made
// absolute. Tests point every path into a temp dir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub new_dir: PathBuf,
    pub train_images_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub cache_file: PathBuf,
    pub data_yaml: PathBuf,
    pub base_weights: PathBuf,
    pub fallback_weights: PathBuf,
    pub project_dir: PathBuf,
    pub trainer_bin: PathBuf,
    pub epochs: u32,
    pub device: Device,
    pub batch: u32,
    /// Seconds
    pub poll_interval: f64,
    pub move_only: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            new_dir: PathBuf::from("data/new annotations"),
            train_images_dir: PathBuf::from("data/train/images"),
            train_labels_dir: PathBuf::from("data/train/labels"),
            cache_file: PathBuf::from("data/train/labels.cache"),
            data_yaml: PathBuf::from("data/data.yaml"),
            base_weights: PathBuf::from("runs/segment/transformer_fault_best/weights/best.pt"),
            fallback_weights: PathBuf::from("yolov8x-seg.pt"),
            project_dir: PathBuf::from("runs/segment"),
            trainer_bin: PathBuf::from("yolo"),
            epochs: 50,
            device: Device::Cuda,
            batch: 8,
            poll_interval: 5.0,
            move_only: false,
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.epochs > 0, "epochs must be positive");
        ensure!(self.batch > 0, "batch must be positive");
        ensure!(
            self.poll_interval.is_finite() && self.poll_interval >= 0.0,
            "poll interval must be a non-negative number of seconds, got {}",
            self.poll_interval
        );
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval).unwrap_or(Duration::ZERO)
    }
}

// ─── Cycle Outcome ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing valid in staging
    Idle,
    /// Samples moved, retraining suppressed by --move-only
    Moved(Vec<CorpusEntry>),
    /// Samples moved and a fine-tuning run completed
    Retrained {
        moved: Vec<CorpusEntry>,
        outcome: RetrainOutcome,
    },
    /// Training failed after shutdown was requested
    Interrupted,
}

impl CycleOutcome {
    /// How long to sleep before the next scan. `None` means scan
    /// again right away.
    pub fn delay(&self, poll_interval: Duration) -> Option<Duration> {
        match self {
            CycleOutcome::Idle => Some(poll_interval),
            _ => None,
        }
    }
}

/// Result of one poll: what the scan skipped, and what the cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct PollCycle {
    pub report: ScanReport,
    pub outcome: CycleOutcome,
}

// ─── Watcher ─────────────────────────────────────────────────────────────────
pub struct Watcher<T: Trainer> {
    config: WatchConfig,
    scanner: StagingScanner,
    mover: CorpusMover,
    trainer: T,
}

impl<T: Trainer> Watcher<T> {
    pub fn new(config: WatchConfig, trainer: T) -> Result<Self> {
        config.validate()?;
        let scanner = StagingScanner::new(&config.new_dir);
        let mover = CorpusMover::new(
            &config.train_images_dir,
            &config.train_labels_dir,
            &config.cache_file,
        );
        Ok(Self { config, scanner, mover, trainer })
    }

    /// Run one full scan -> move -> (retrain) cycle.
    pub fn poll_once(&self, shutdown: &Shutdown) -> Result<PollCycle> {
        let (samples, report) = self.scanner.collect()?;
        let outcome = self.process(samples, shutdown)?;
        Ok(PollCycle { report, outcome })
    }

    fn process(&self, samples: Vec<StagingSample>, shutdown: &Shutdown) -> Result<CycleOutcome> {
        if samples.is_empty() {
            return Ok(CycleOutcome::Idle);
        }

        tracing::info!(
            "Found {} new labeled images. Moving to training split...",
            samples.len()
        );
        let moved = self.mover.move_to_corpus(&samples)?;

        if self.config.move_only {
            tracing::info!("Move-only flag set; skipping fine-tuning.");
            return Ok(CycleOutcome::Moved(moved));
        }

        match RetrainUseCase::new(&self.config).execute(&self.trainer) {
            Ok(outcome) => Ok(CycleOutcome::Retrained { moved, outcome }),
            // ctrl-c reaches the child too; its failure is the interrupt
            Err(e) if shutdown.is_triggered() => {
                tracing::warn!("Retraining interrupted: {:#}", e);
                Ok(CycleOutcome::Interrupted)
            }
            Err(e) => Err(e),
        }
    }

    /// Poll until `shutdown` is raised. Returns Ok on a clean stop;
    /// any I/O or training failure ends the loop with Err.
    pub fn run(&self, shutdown: &Shutdown) -> Result<()> {
        println!(
            "Watching {} for new labeled samples (poll every {:.1}s). Press Ctrl+C to stop.",
            self.config.new_dir.display(),
            self.config.poll_interval
        );

        while !shutdown.is_triggered() {
            let PollCycle { outcome, .. } = self.poll_once(shutdown)?;
            if outcome == CycleOutcome::Interrupted {
                break;
            }
            if let Some(delay) = outcome.delay(self.config.poll_interval()) {
                if shutdown.wait(delay) {
                    break;
                }
            }
        }

        println!("\nStopping watcher.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrain::RetrainRun;
    use anyhow::bail;
    use std::{
        cell::{Cell, RefCell},
        fs,
        path::Path,
        thread,
        time::Instant,
    };
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeTrainer {
        runs: RefCell<Vec<RetrainRun>>,
    }

    impl Trainer for FakeTrainer {
        fn train(&self, run: &RetrainRun) -> Result<RetrainOutcome> {
            self.runs.borrow_mut().push(run.clone());
            Ok(RetrainOutcome {
                run_dir: run.run_dir(),
                ..Default::default()
            })
        }
    }

    /// Simulates the child dying from the same ctrl-c
    struct InterruptedTrainer(Shutdown);

    impl Trainer for InterruptedTrainer {
        fn train(&self, _run: &RetrainRun) -> Result<RetrainOutcome> {
            self.0.trigger();
            bail!("training exited with signal 2")
        }
    }

    struct BrokenTrainer;

    impl Trainer for BrokenTrainer {
        fn train(&self, _run: &RetrainRun) -> Result<RetrainOutcome> {
            bail!("dataset descriptor not found")
        }
    }

    fn config(root: &Path) -> WatchConfig {
        WatchConfig {
            new_dir: root.join("data/new annotations"),
            train_images_dir: root.join("data/train/images"),
            train_labels_dir: root.join("data/train/labels"),
            cache_file: root.join("data/train/labels.cache"),
            base_weights: root.join("runs/segment/transformer_fault_best/weights/best.pt"),
            project_dir: root.join("runs/segment"),
            poll_interval: 0.01,
            ..WatchConfig::default()
        }
    }

    fn write(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn count(dir: &Path) -> usize {
        fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_defaults_match_documented_cli() {
        let cfg = WatchConfig::default();
        assert_eq!(cfg.new_dir, PathBuf::from("data/new annotations"));
        assert_eq!(cfg.epochs, 50);
        assert_eq!(cfg.device, Device::Cuda);
        assert_eq!(cfg.batch, 8);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert!(!cfg.move_only);
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(WatchConfig { epochs: 0, ..Default::default() }.validate().is_err());
        assert!(WatchConfig { batch: 0, ..Default::default() }.validate().is_err());
        assert!(WatchConfig { poll_interval: -1.0, ..Default::default() }.validate().is_err());
        assert!(WatchConfig { poll_interval: f64::NAN, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_only_idle_cycles_sleep() {
        let interval = Duration::from_secs(5);
        assert_eq!(CycleOutcome::Idle.delay(interval), Some(interval));
        assert_eq!(CycleOutcome::Moved(Vec::new()).delay(interval), None);
        assert_eq!(CycleOutcome::Interrupted.delay(interval), None);
    }

    #[test]
    fn test_mixed_staging_cycle() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());
        write(&cfg.new_dir.join("images/img1.jpg"));
        write(&cfg.new_dir.join("labels/img1.txt"));
        write(&cfg.new_dir.join("images/img2.bad"));
        write(&cfg.new_dir.join("labels/img2.txt"));
        write(&cfg.new_dir.join("images/img3.png"));
        write(&cfg.cache_file);

        let trainer = FakeTrainer::default();
        let watcher = Watcher::new(cfg.clone(), &trainer).unwrap();
        let PollCycle { report, outcome } = watcher.poll_once(&Shutdown::new()).unwrap();

        assert_eq!(report, ScanReport { unsupported: 1, missing_label: 1 });
        let CycleOutcome::Retrained { moved, .. } = &outcome else {
            panic!("expected a retrain, got {outcome:?}");
        };
        assert_eq!(moved.len(), 1);
        assert!(cfg.train_images_dir.join("img1.jpg").exists());
        assert!(cfg.train_labels_dir.join("img1.txt").exists());
        assert!(!cfg.new_dir.join("images/img1.jpg").exists());
        // Skipped files stay behind for a later cycle
        assert!(cfg.new_dir.join("images/img2.bad").exists());
        assert!(cfg.new_dir.join("images/img3.png").exists());
        assert!(!cfg.cache_file.exists());

        let runs = trainer.runs.borrow();
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].epochs, runs[0].device, runs[0].batch), (50, Device::Cuda, 8));
        assert!(runs[0].name.starts_with("finetune_"));
    }

    #[test]
    fn test_empty_staging_does_nothing() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());
        write(&cfg.cache_file);

        let trainer = FakeTrainer::default();
        let watcher = Watcher::new(cfg.clone(), &trainer).unwrap();

        let cycle = watcher.poll_once(&Shutdown::new()).unwrap();
        assert_eq!(cycle.outcome, CycleOutcome::Idle);
        assert_eq!(cycle.report, ScanReport::default());
        assert!(cfg.cache_file.exists());
        assert!(trainer.runs.borrow().is_empty());
        assert_eq!(count(&cfg.train_images_dir), 0);
    }

    #[test]
    fn test_move_only_never_trains() {
        let tmp = TempDir::new().unwrap();
        let cfg = WatchConfig { move_only: true, ..config(tmp.path()) };
        for stem in ["a", "b"] {
            write(&cfg.new_dir.join(format!("images/{stem}.tif")));
            write(&cfg.new_dir.join(format!("labels/{stem}.txt")));
        }

        let trainer = FakeTrainer::default();
        let watcher = Watcher::new(cfg.clone(), &trainer).unwrap();
        let outcome = watcher.poll_once(&Shutdown::new()).unwrap().outcome;

        assert!(matches!(outcome, CycleOutcome::Moved(ref m) if m.len() == 2));
        assert_eq!(count(&cfg.train_images_dir), 2);
        assert_eq!(count(&cfg.train_labels_dir), 2);
        assert!(trainer.runs.borrow().is_empty());
    }

    #[test]
    fn test_run_stops_when_already_shut_down() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());
        let shutdown = Shutdown::new();
        shutdown.trigger();

        Watcher::new(cfg.clone(), FakeTrainer::default())
            .unwrap()
            .run(&shutdown)
            .unwrap();

        // Shut down before the first tick, so nothing was scanned
        assert!(!cfg.new_dir.exists());
    }

    #[test]
    fn test_run_stops_on_signal_while_idle() {
        let tmp = TempDir::new().unwrap();
        let cfg = WatchConfig { move_only: true, ..config(tmp.path()) };
        write(&cfg.new_dir.join("images/a.jpg"));
        write(&cfg.new_dir.join("labels/a.txt"));

        let shutdown = Shutdown::new();
        let remote = shutdown.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            remote.trigger();
        });

        Watcher::new(cfg.clone(), FakeTrainer::default())
            .unwrap()
            .run(&shutdown)
            .unwrap();
        stopper.join().unwrap();

        assert!(cfg.train_images_dir.join("a.jpg").exists());
        assert_eq!(count(&cfg.new_dir.join("images")), 0);
    }

    /// Drops a second labeled pair into staging during the first
    /// run, and raises shutdown once it has been trained on.
    struct DripTrainer {
        staging: PathBuf,
        shutdown: Shutdown,
        calls: Cell<usize>,
    }

    impl Trainer for DripTrainer {
        fn train(&self, run: &RetrainRun) -> Result<RetrainOutcome> {
            self.calls.set(self.calls.get() + 1);
            match self.calls.get() {
                1 => {
                    write(&self.staging.join("images/b.jpg"));
                    write(&self.staging.join("labels/b.txt"));
                }
                _ => self.shutdown.trigger(),
            }
            Ok(RetrainOutcome {
                run_dir: run.run_dir(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_run_rescans_without_sleep_after_batch() {
        let tmp = TempDir::new().unwrap();
        let cfg = WatchConfig { poll_interval: 30.0, ..config(tmp.path()) };
        write(&cfg.new_dir.join("images/a.jpg"));
        write(&cfg.new_dir.join("labels/a.txt"));

        let shutdown = Shutdown::new();
        // Guard so a regression fails the timing assert instead of hanging
        let guard = shutdown.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(20));
            guard.trigger();
        });
        let trainer = DripTrainer {
            staging: cfg.new_dir.clone(),
            shutdown: shutdown.clone(),
            calls: Cell::new(0),
        };

        let start = Instant::now();
        Watcher::new(cfg.clone(), &trainer).unwrap().run(&shutdown).unwrap();

        assert!(start.elapsed() < Duration::from_secs(10), "{:?}", start.elapsed());
        assert_eq!(trainer.calls.get(), 2);
        assert!(cfg.train_images_dir.join("a.jpg").exists());
        assert!(cfg.train_images_dir.join("b.jpg").exists());
        assert_eq!(count(&cfg.new_dir.join("images")), 0);
    }

    #[test]
    fn test_training_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());
        write(&cfg.new_dir.join("images/a.jpg"));
        write(&cfg.new_dir.join("labels/a.txt"));

        let err = Watcher::new(cfg.clone(), BrokenTrainer)
            .unwrap()
            .run(&Shutdown::new())
            .unwrap_err();

        assert!(err.to_string().contains("dataset descriptor"));
        // The move was already committed before training started
        assert!(cfg.train_images_dir.join("a.jpg").exists());
    }

    #[test]
    fn test_training_killed_by_interrupt_is_clean() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path());
        write(&cfg.new_dir.join("images/a.jpg"));
        write(&cfg.new_dir.join("labels/a.txt"));
        let shutdown = Shutdown::new();

        Watcher::new(cfg, InterruptedTrainer(shutdown.clone()))
            .unwrap()
            .run(&shutdown)
            .unwrap();
    }
}
