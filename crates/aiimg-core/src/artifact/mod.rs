//! Content directory for generated images.
//!
//! - [`store`] validates, names and writes artifacts
//! - [`cleanup`] reclaims artifacts older than the retention window

pub mod cleanup;
pub mod store;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub use cleanup::CleanupReport;
pub use store::ArtifactStore;

/// Filename prefix shared by every artifact this crate writes.
pub const ARTIFACT_PREFIX: &str = "aiimg_";

/// Suffix of in-progress writes. Cleanup removes them only once they are
/// older than the retention window.
pub const PARTIAL_SUFFIX: &str = ".part";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// A saved artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// File name, unique within the content directory
    pub id: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size: usize,
}

impl ArtifactHandle {
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.id).extension().and_then(|e| e.to_str())
    }
}

/// Whether `name` looks like a finished artifact (prefix + image extension).
pub fn is_artifact_name(name: &str) -> bool {
    if !name.starts_with(ARTIFACT_PREFIX) || name.ends_with(PARTIAL_SUFFIX) {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Whether `name` is an in-progress write left by this crate.
pub fn is_partial_name(name: &str) -> bool {
    name.starts_with(ARTIFACT_PREFIX) && name.ends_with(PARTIAL_SUFFIX)
}

/// Whether an upstream format hint (`png`, `image/jpeg`, ...) names the
/// same format as a sniffed extension.
pub fn hint_matches_extension(hint: &str, extension: &str) -> bool {
    fn canonical(value: &str) -> String {
        let value = value.trim().to_ascii_lowercase();
        let value = value.rsplit('/').next().unwrap_or_default().to_string();
        if value == "jpeg" {
            "jpg".to_string()
        } else {
            value
        }
    }
    canonical(hint) == canonical(extension)
}
