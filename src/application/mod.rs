// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Workflow coordination only: the scanning, moving and process
// spawning happen in the data and ml layers.
//
//   watch_use_case.rs   - the long-running poll loop. Owns the
//                         Idle/Processing state machine and decides
//                         when to sleep and when to stop.
//
//   retrain_use_case.rs - one fine-tuning request. Picks the base
//                         weights, names the run, blocks on the
//                         collaborator and reports its metrics.
//
// Neither use case prints progress bars or parses CLI flags; that
// is Layer 1. Neither touches files directly; that is Layer 4.

/// The poll loop: scan, move, retrain, sleep
pub mod watch_use_case;

/// One fine-tuning request to the training collaborator
pub mod retrain_use_case;
