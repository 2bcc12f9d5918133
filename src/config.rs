use crate::platform::default_filters;
use crate::types::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "tuck";
pub const CONFIG_FILE_NAME: &str = "tuck.yaml";
pub const LEDGER_FILE_NAME: &str = "installed.json";

pub fn get_config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TUCK_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join(APP_NAME)
        .join(CONFIG_FILE_NAME);
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

/// Per-user state directory holding the ledger and the lock file.
pub fn get_state_dir() -> Result<PathBuf> {
    let path = match std::env::var("TUCK_STATE_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not determine state directory"))?
            .join(APP_NAME),
    };
    tracing::debug!("State directory: {}", path.display());
    fs::create_dir_all(&path)
        .with_context(|| format!("Could not create state directory {}", path.display()))?;
    Ok(path)
}

pub fn get_cache_dir() -> Result<PathBuf> {
    let path = match std::env::var("TUCK_CACHE_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join(APP_NAME),
    };
    tracing::debug!("Cache directory: {}", path.display());
    fs::create_dir_all(&path)
        .with_context(|| format!("Could not create cache directory {}", path.display()))?;
    Ok(path)
}

pub fn get_ledger_path() -> Result<PathBuf> {
    Ok(get_state_dir()?.join(LEDGER_FILE_NAME))
}

/// Load the user's config, or the platform defaults if there is none.
pub fn load_config() -> Result<TuckConfig> {
    load_config_from(&get_config_file_path()?)
}

pub fn load_config_from(path: &Path) -> Result<TuckConfig> {
    if !path.exists() {
        tracing::debug!("No config at {}, using platform defaults", path.display());
        return Ok(TuckConfig {
            filters: default_filters()?,
        });
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read config file at {}", path.display()))?;

    // An empty file deserializes to null; treat it like an empty mapping.
    if content.trim().is_empty() {
        return Ok(TuckConfig::default());
    }

    serde_yaml::from_str(&content)
        .with_context(|| format!("Could not parse config file {} as YAML", path.display()))
}

pub fn save_config(config: &TuckConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let content = serde_yaml::to_string(config)?;
    fs::write(path, content)
        .with_context(|| format!("Could not write config file {}", path.display()))?;

    Ok(())
}

/// Expand a leading `~` and make the result absolute.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = match path.strip_prefix('~') {
        Some(rest) => {
            let home =
                dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
            home.join(rest.trim_start_matches(['/', '\\']))
        }
        None => PathBuf::from(path),
    };
    std::path::absolute(&expanded)
        .with_context(|| format!("Could not make {} absolute", expanded.display()))
}

/// Shorten paths under the home directory to `~/...` for display.
pub fn contract_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}
