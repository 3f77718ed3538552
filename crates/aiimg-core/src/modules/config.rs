use std::fs;
use std::path::Path;

use aiimg_types::{ConfigError, EngineConfig};

const ENV_API_KEYS: &str = "AIIMG_API_KEYS";
const ENV_API_BASE: &str = "AIIMG_API_BASE";
const ENV_MODEL: &str = "AIIMG_MODEL";

/// Load configuration from a JSON file.
///
/// A missing file yields defaults. Environment overrides are applied after
/// parsing, then the result is validated.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let config = if path.exists() {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?
    } else {
        tracing::debug!("Config {} not found, using defaults", path.display());
        EngineConfig::default()
    };

    apply_overrides(config, |key| std::env::var(key).ok()).validated()
}

/// Like [`load_config`], but a missing file is [`ConfigError::NotFound`].
/// For paths the user named explicitly.
pub fn load_existing_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.display().to_string() });
    }
    load_config(path)
}

/// Save configuration atomically (temp file + rename).
pub fn save_config(path: &Path, config: &EngineConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::from_io_error(&e))?;
    }
    let temp_path = path.with_extension("json.tmp");
    let content =
        serde_json::to_string_pretty(config).map_err(|e| ConfigError::from_json_error(&e))?;

    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::from_io_error(&e))
}

/// Apply `AIIMG_*` overrides from `lookup`. Empty or invalid values are
/// ignored with a warning.
pub fn apply_overrides<F>(mut config: EngineConfig, lookup: F) -> EngineConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_API_KEYS) {
        let keys: Vec<String> = raw
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            tracing::warn!("{} is empty, keeping configured keys", ENV_API_KEYS);
        } else {
            tracing::info!("Using {} API keys from {}", keys.len(), ENV_API_KEYS);
            config.api_keys = keys;
        }
    }

    if let Some(raw) = lookup(ENV_API_BASE) {
        let base = raw.trim().trim_end_matches('/').to_string();
        if base.is_empty() {
            tracing::warn!("{} is empty, keeping configured base", ENV_API_BASE);
        } else if url::Url::parse(&base).is_err() {
            tracing::warn!("{} is not a valid URL, keeping configured base", ENV_API_BASE);
        } else {
            tracing::info!("Using custom API base from {}", ENV_API_BASE);
            config.api_base = Some(base);
        }
    }

    if let Some(raw) = lookup(ENV_MODEL) {
        let model = raw.trim();
        if !model.is_empty() {
            config.model_name = model.to_string();
        }
    }

    config
}
