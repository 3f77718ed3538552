use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use super::{is_artifact_name, is_partial_name};

/// Result of one cleanup pass. Per-file failures are recorded, not raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub retained: usize,
    /// Files that could not be inspected or removed, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_noop(&self) -> bool {
        self.removed == 0 && self.skipped.is_empty()
    }
}

pub(super) async fn sweep(dir: &Path, retention: Duration, now: SystemTime) -> CleanupReport {
    let mut report = CleanupReport::default();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return report,
        Err(e) => {
            warn!(dir = %dir.display(), "Cannot scan artifact directory: {}", e);
            report.skipped.push((dir.to_path_buf(), e.to_string()));
            return report;
        },
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), "Artifact scan interrupted: {}", e);
                report.skipped.push((dir.to_path_buf(), e.to_string()));
                break;
            },
        };

        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        // Interrupted writes and reservations age out like finished artifacts
        let partial = is_partial_name(&name);
        if !partial && !is_artifact_name(&name) {
            continue;
        }

        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!(artifact = %name, "Skipping artifact without mtime: {}", e);
                report.skipped.push((path, e.to_string()));
                continue;
            },
        };

        // mtime after `now` means the file was written after the scan began
        let expired = now.duration_since(modified).map(|age| age >= retention).unwrap_or(false);
        if !expired {
            report.retained += 1;
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(artifact = %name, partial, "Removed expired artifact");
                report.removed += 1;
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                report.skipped.push((path, "already removed".to_string()));
            },
            Err(e) => {
                warn!(artifact = %name, "Failed to remove expired artifact: {}", e);
                report.skipped.push((path, e.to_string()));
            },
        }
    }

    if !report.is_noop() {
        info!(
            removed = report.removed,
            retained = report.retained,
            skipped = report.skipped.len(),
            "Artifact cleanup finished"
        );
    }
    report
}
