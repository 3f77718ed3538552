use base64::Engine as _;
use chrono::{DateTime, Utc};
use image::ImageFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use aiimg_types::{ArtifactConfig, GenerationError};

use super::cleanup::{self, CleanupReport};
use super::{ArtifactHandle, ARTIFACT_PREFIX, PARTIAL_SUFFIX};
use crate::error::AppResult;
use crate::utils::paths::default_images_dir;

const MAX_NAME_ATTEMPTS: usize = 8;

/// Writes artifacts into one content directory and reclaims old ones.
///
/// Cloning is cheap; clones share the same directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    retention: Duration,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self { dir: dir.into(), retention }
    }

    /// Store rooted at `config.dir`, or the default images directory.
    pub fn from_config(config: &ArtifactConfig) -> AppResult<Self> {
        let dir = match &config.dir {
            Some(dir) => dir.clone(),
            None => default_images_dir()?,
        };
        Ok(Self::new(dir, Duration::from_secs(config.retention_secs)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Validate `data` as an image and write it under a fresh unique name.
    ///
    /// The final name is reserved with `create_new` before any bytes are
    /// written; the payload goes to `<name>.part` and is renamed over the
    /// reservation, so a reader never sees a half-written artifact.
    pub async fn save(&self, data: &[u8]) -> Result<ArtifactHandle, GenerationError> {
        let extension = sniff_extension(data)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(storage_error)?;

        let created_at = Utc::now();
        let (id, path) = self.reserve(created_at, extension).await?;
        let partial = self.dir.join(format!("{}{}", id, PARTIAL_SUFFIX));

        if let Err(e) = write_then_rename(&partial, &path, data).await {
            let _ = tokio::fs::remove_file(&partial).await;
            let _ = tokio::fs::remove_file(&path).await;
            return Err(storage_error(e));
        }

        info!(artifact = %id, bytes = data.len(), "Saved artifact");
        Ok(ArtifactHandle { id, path, created_at, size: data.len() })
    }

    /// Decode base64 (optionally a `data:image/...;base64,` URI) and save.
    pub async fn save_base64(&self, encoded: &str) -> Result<ArtifactHandle, GenerationError> {
        let payload = match encoded.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => encoded,
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| GenerationError::ArtifactDecode { message: format!("invalid base64: {}", e) })?;
        self.save(&data).await
    }

    /// Remove artifacts whose age at `now` is at least the retention window.
    pub async fn cleanup(&self, now: SystemTime) -> CleanupReport {
        cleanup::sweep(&self.dir, self.retention, now).await
    }

    async fn reserve(
        &self,
        created_at: DateTime<Utc>,
        extension: &str,
    ) -> Result<(String, PathBuf), GenerationError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let id = artifact_name(created_at, extension);
            let path = self.dir.join(&id);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(_) => return Ok((id, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(artifact = %id, "Artifact name taken, regenerating");
                },
                Err(e) => return Err(storage_error(e)),
            }
        }
        warn!(dir = %self.dir.display(), "Could not find a free artifact name");
        Err(GenerationError::Storage { message: "no free artifact name".to_string() })
    }
}

/// `aiimg_<YYYYmmdd_HHMMSS>_<8 hex>.<ext>`
pub fn artifact_name(created_at: DateTime<Utc>, extension: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}{}_{}.{}",
        ARTIFACT_PREFIX,
        created_at.format("%Y%m%d_%H%M%S"),
        &suffix[..8],
        extension
    )
}

/// File extension for a supported image payload.
pub fn sniff_extension(data: &[u8]) -> Result<&'static str, GenerationError> {
    if data.is_empty() {
        return Err(GenerationError::ArtifactDecode { message: "empty image payload".to_string() });
    }
    let format = image::guess_format(data)
        .map_err(|e| GenerationError::ArtifactDecode { message: e.to_string() })?;
    match format {
        ImageFormat::Png => Ok("png"),
        ImageFormat::Jpeg => Ok("jpg"),
        ImageFormat::WebP => Ok("webp"),
        ImageFormat::Gif => Ok("gif"),
        other => Err(GenerationError::ArtifactDecode {
            message: format!("unsupported image format: {:?}", other),
        }),
    }
}

async fn write_then_rename(partial: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(partial).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(partial, path).await
}

fn storage_error(e: std::io::Error) -> GenerationError {
    GenerationError::Storage { message: e.to_string() }
}
