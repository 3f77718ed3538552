use std::fs;
use std::path::PathBuf;

const DATA_DIR: &str = "aiimg";
const IMAGES_DIR: &str = "images";
const CONFIG_FILE: &str = "config.json";

/// Get data directory path.
///
/// Priority:
/// 1. `AIIMG_DATA_DIR` environment variable (for container deployments)
/// 2. `<platform data dir>/aiimg`
/// 3. `~/.aiimg`
pub fn get_data_dir() -> Result<PathBuf, String> {
    let data_dir = if let Ok(custom_dir) = std::env::var("AIIMG_DATA_DIR") {
        PathBuf::from(custom_dir)
    } else if let Some(dir) = dirs::data_dir() {
        dir.join(DATA_DIR)
    } else {
        let home = dirs::home_dir().ok_or("Cannot get home directory")?;
        home.join(format!(".{}", DATA_DIR))
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .map_err(|e| format!("Failed to create data directory: {}", e))?;
    }

    Ok(data_dir)
}

/// Default content directory for generated artifacts.
pub fn default_images_dir() -> Result<PathBuf, String> {
    Ok(get_data_dir()?.join(IMAGES_DIR))
}

/// Default config file location.
pub fn default_config_path() -> Result<PathBuf, String> {
    Ok(get_data_dir()?.join(CONFIG_FILE))
}
