// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting pieces used by more than one layer:
//
//   shutdown.rs - ctrl-c aware stop flag for the poll loop.
//                 The handler only flips a flag; the loop decides
//                 when to look at it (between cycles, and while
//                 sleeping).
//
//   metrics.rs  - collaborator results.csv parsing and the
//                 append-only retrain history
//                 (runs/segment/finetune_history.jsonl).

pub mod shutdown;

pub mod metrics;
