// ============================================================
// Layer 5 - Training Collaborator
// ============================================================
// The only layer that knows fine-tuning is done by Ultralytics.
// Everything above talks to the domain::traits::Trainer seam.
//
// There is no training loop here. The segmentation model, the
// optimiser, augmentation and validation all run inside the
// `yolo` process; this layer builds its argument list, waits for
// it to exit and reads back results.csv.

/// `yolo segment train` process wrapper and the fine-tuning profile
pub mod trainer;
