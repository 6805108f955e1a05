// ============================================================
// Layer 4 - Filesystem Data Layer
// ============================================================
//
//   <new_dir>/images + labels
//       |
//       v
//   StagingScanner  -> validated StagingSample pairs
//       |
//       v
//   CorpusMover     -> data/train/{images,labels}, cache removed

/// Finds labeled images in the staging directory
pub mod scanner;

/// Collision-safe moves into the training split
pub mod mover;
