// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain structs, enums and traits that name the concepts of the
// ingestion watcher. Nothing in here touches the filesystem or
// spawns processes; the data and ml layers do that.
//
//   sample.rs  - StagingSample and CorpusEntry
//   retrain.rs - RetrainRun, Device, MetricMap, RetrainOutcome
//   traits.rs  - Trainer, the seam to the training collaborator

/// Image/label pairs in staging and in the training corpus
pub mod sample;

/// Retraining request and result types
pub mod retrain;

/// Core abstractions implemented by other layers
pub mod traits;
