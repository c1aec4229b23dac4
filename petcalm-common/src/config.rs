//! Configuration file location and root folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PETCALM_CONFIG";

/// Environment variable naming the storage root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "PETCALM_ROOT_FOLDER";

/// Root folder resolution priority order:
/// 1. Explicit argument from the embedding application (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(explicit: Option<&Path>, toml_root: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_root {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Locate the config file to load, if any
///
/// Order: explicit path, `PETCALM_CONFIG`, then the per-user config
/// directory. An explicit or env path that does not exist is an error;
/// a missing per-user file just means "use defaults".
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return existing(path.to_path_buf()).map(Some);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return existing(PathBuf::from(path)).map(Some);
        }
    }

    Ok(user_config_file().filter(|p| p.exists()))
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// `~/.config/petcalm/config.toml` (platform equivalent elsewhere)
fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("petcalm").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("petcalm"))
            .unwrap_or_else(|| PathBuf::from("./petcalm_data"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/petcalm
        dirs::data_dir()
            .map(|d| d.join("petcalm"))
            .unwrap_or_else(|| PathBuf::from("./petcalm_data"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("petcalm"))
            .unwrap_or_else(|| PathBuf::from(".\\petcalm_data"))
    } else {
        PathBuf::from("./petcalm_data")
    }
}
