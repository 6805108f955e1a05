// ============================================================
// Layer 3 - Sample Domain Types
// ============================================================
// A labeled sample is always a pair of files that share a stem:
//
//   images/t42_hotspot.jpg   <->   labels/t42_hotspot.txt
//
// StagingSample is the pair as found in the staging directory.
// CorpusEntry is where that pair ended up in the training split,
// possibly under a different (collision-free) name.

use std::path::{Path, PathBuf};

/// Image extensions accepted by the scanner, lower-case, no dot.
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Extension of every label file.
pub const LABEL_EXTENSION: &str = "txt";

/// Returns true if `path` has an allowed image extension (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SUPPORTED_IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| e.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// An image and its label, both present in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSample {
    pub image: PathBuf,
    pub label: PathBuf,
}

impl StagingSample {
    pub fn new(image: impl Into<PathBuf>, label: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            label: label.into(),
        }
    }

    /// File name of the image, for log lines
    pub fn image_name(&self) -> String {
        display_name(&self.image)
    }
}

/// Where a staging sample landed inside the training split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub image: PathBuf,
    pub label: PathBuf,
}

impl CorpusEntry {
    pub fn image_name(&self) -> String {
        display_name(&self.image)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
