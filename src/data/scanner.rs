// ============================================================
// Layer 4 - Staging Scanner
// ============================================================
// Walks <new_dir>/images and pairs every supported image with
// <new_dir>/labels/<stem>.txt.
//
//   images/a.jpg  + labels/a.txt   -> StagingSample
//   images/b.bad                   -> counted as unsupported
//   images/c.png  (no labels/c.txt) -> warned, left in staging
//
// A Scan is a lazy iterator over one read_dir pass. Calling
// StagingScanner::scan again starts a fresh pass, so images
// whose label had not arrived yet are picked up next time.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::sample::{is_supported_image, StagingSample, LABEL_EXTENSION};

/// Counters for everything a scan skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Image files with an extension outside the allow-list
    pub unsupported: usize,
    /// Supported images whose label file is not there (yet)
    pub missing_label: usize,
}

/// Scans a staging directory with `images/` and `labels/` inside.
#[derive(Debug, Clone)]
pub struct StagingScanner {
    images_dir: PathBuf,
    labels_dir: PathBuf,
}

impl StagingScanner {
    pub fn new(new_dir: impl AsRef<Path>) -> Self {
        let new_dir = new_dir.as_ref();
        Self {
            images_dir: new_dir.join("images"),
            labels_dir: new_dir.join("labels"),
        }
    }

    /// Start a new pass over the staging images.
    ///
    /// Creates `images/` and `labels/` if they are missing so the
    /// operator always has somewhere to drop files.
    pub fn scan(&self) -> Result<Scan> {
        for dir in [&self.images_dir, &self.labels_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create staging directory '{}'", dir.display()))?;
        }

        let entries = fs::read_dir(&self.images_dir)
            .with_context(|| format!("Cannot read directory '{}'", self.images_dir.display()))?;

        Ok(Scan {
            entries,
            images_dir: self.images_dir.clone(),
            labels_dir: self.labels_dir.clone(),
            report: ScanReport::default(),
        })
    }

    /// Drain one full pass. Samples are sorted by image path so a
    /// batch is always moved in the same order.
    pub fn collect(&self) -> Result<(Vec<StagingSample>, ScanReport)> {
        let mut scan = self.scan()?;
        let mut samples = scan.by_ref().collect::<Result<Vec<_>>>()?;
        samples.sort_by(|a, b| a.image.cmp(&b.image));

        let report = *scan.report();
        if report.unsupported > 0 {
            tracing::info!(
                "Skipped {} files with unsupported extensions",
                report.unsupported
            );
        }
        Ok((samples, report))
    }
}

/// One lazy pass over `images/`.
#[derive(Debug)]
pub struct Scan {
    entries: fs::ReadDir,
    images_dir: PathBuf,
    labels_dir: PathBuf,
    report: ScanReport,
}

impl Scan {
    /// What has been skipped so far in this pass
    pub fn report(&self) -> &ScanReport {
        &self.report
    }

    fn label_for(&self, image: &Path) -> Option<PathBuf> {
        let mut name = image.file_stem()?.to_os_string();
        name.push(".");
        name.push(LABEL_EXTENSION);
        Some(self.labels_dir.join(name))
    }
}

impl Iterator for Scan {
    type Item = Result<StagingSample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    return Some(Err(e).with_context(|| {
                        format!("Cannot read entry in '{}'", self.images_dir.display())
                    }))
                }
            };
            let path = entry.path();

            // Sub-directories and other non-files are ignored outright
            if !path.is_file() {
                continue;
            }

            if !is_supported_image(&path) {
                self.report.unsupported += 1;
                continue;
            }

            let Some(label) = self.label_for(&path) else {
                self.report.unsupported += 1;
                continue;
            };

            if !label.exists() {
                tracing::warn!(
                    "missing label for {}; skipping",
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
                self.report.missing_label += 1;
                continue;
            }

            return Some(Ok(StagingSample::new(path, label)));
        }
    }
}
