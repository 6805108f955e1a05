// ============================================================
// Layer 4 - Corpus Mover
// ============================================================
// Moves validated staging samples into the training split and
// invalidates the label index cache afterwards.
//
// Collision handling (never overwrites):
//   data/train/images/img1.jpg           <- free?  use as-is
//   data/train/images/img1_20240309_070501.jpg   <- else timestamp
//   data/train/images/img1_20240309_070501_1.jpg <- else counter
//
// Image and label destinations are resolved independently.
//
// A batch is NOT atomic. Each file move either happens or not,
// but a failure half way leaves the earlier samples in the corpus
// and the later ones in staging. The next poll picks those up.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::sample::{CorpusEntry, StagingSample};

/// True if anything (file, dir, even a dangling symlink) sits at `path`
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Return `dest` if free, otherwise a collision-free sibling path.
pub fn unique_destination(dest: &Path) -> PathBuf {
    unique_destination_at(dest, Local::now())
}

/// Same as [`unique_destination`] with an explicit clock reading.
pub fn unique_destination_at(dest: &Path, now: DateTime<Local>) -> PathBuf {
    if !occupied(dest) {
        return dest.to_path_buf();
    }

    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut candidate = dest.with_file_name(format!("{stem}_{stamp}{ext}"));
    let mut counter = 1u32;
    while occupied(&candidate) {
        candidate = dest.with_file_name(format!("{stem}_{stamp}_{counter}{ext}"));
        counter += 1;
    }
    candidate
}

/// Rename, falling back to copy + delete when rename is not possible
/// (e.g. staging and corpus on different filesystems).
fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if let Err(rename_err) = fs::rename(src, dest) {
        tracing::debug!(
            "rename '{}' -> '{}' failed ({}); copying instead",
            src.display(),
            dest.display(),
            rename_err
        );
        fs::copy(src, dest).with_context(|| {
            format!("Cannot move '{}' to '{}'", src.display(), dest.display())
        })?;
        fs::remove_file(src)
            .with_context(|| format!("Copied but cannot remove '{}'", src.display()))?;
    }
    Ok(())
}

/// The training split the watcher feeds.
#[derive(Debug, Clone)]
pub struct CorpusMover {
    images_dir: PathBuf,
    labels_dir: PathBuf,
    cache_file: PathBuf,
}

impl CorpusMover {
    pub fn new(
        images_dir: impl Into<PathBuf>,
        labels_dir: impl Into<PathBuf>,
        cache_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            images_dir: images_dir.into(),
            labels_dir: labels_dir.into(),
            cache_file: cache_file.into(),
        }
    }

    /// Move every sample into the corpus, then drop the stale cache.
    ///
    /// An empty batch is a no-op: nothing moves and the cache is
    /// left alone. If a move fails part way, the cache is still
    /// removed before the error is returned, since earlier samples
    /// (or the failing sample's image) may already be in the corpus.
    pub fn move_to_corpus(&self, samples: &[StagingSample]) -> Result<Vec<CorpusEntry>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        for dir in [&self.images_dir, &self.labels_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create corpus directory '{}'", dir.display()))?;
        }

        let mut moved = Vec::with_capacity(samples.len());
        for sample in samples {
            match self.move_one(sample) {
                Ok(entry) => {
                    tracing::info!("Moved {} -> {}", sample.image_name(), entry.image_name());
                    moved.push(entry);
                }
                Err(e) => {
                    // The move error is the one worth reporting
                    if let Err(cache_err) = self.invalidate_cache() {
                        tracing::warn!("{:#}", cache_err);
                    }
                    return Err(e);
                }
            }
        }

        self.invalidate_cache()?;
        Ok(moved)
    }

    fn move_one(&self, sample: &StagingSample) -> Result<CorpusEntry> {
        let image_name = sample
            .image
            .file_name()
            .with_context(|| format!("'{}' has no file name", sample.image.display()))?;
        let label_name = sample
            .label
            .file_name()
            .with_context(|| format!("'{}' has no file name", sample.label.display()))?;

        let image = unique_destination(&self.images_dir.join(image_name));
        let label = unique_destination(&self.labels_dir.join(label_name));

        move_file(&sample.image, &image)?;
        move_file(&sample.label, &label)?;

        Ok(CorpusEntry { image, label })
    }

    /// Delete the label index cache if present. Returns whether a
    /// file was removed.
    pub fn invalidate_cache(&self) -> Result<bool> {
        if !self.cache_file.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.cache_file)
            .with_context(|| format!("Cannot remove cache '{}'", self.cache_file.display()))?;
        tracing::info!("Removed train label cache to force refresh");
        Ok(true)
    }
}
