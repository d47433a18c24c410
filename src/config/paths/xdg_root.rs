//! XDG Base Directory locations for coupler data and configuration.

use crate::error::ApiError;
use std::path::PathBuf;

/// `$XDG_DATA_HOME`, else `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data_home.is_empty() {
            return Some(PathBuf::from(xdg_data_home));
        }
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// `$XDG_CONFIG_HOME`, else `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }
    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(PathBuf::from(home).join(".config"))
}

/// Default results database: `$XDG_DATA_HOME/coupler/results`
pub fn default_results_dir() -> Result<PathBuf, ApiError> {
    let data_home = data_home().ok_or_else(|| {
        ApiError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(data_home.join("coupler").join("results"))
}

/// Global configuration file: `$XDG_CONFIG_HOME/coupler/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    config_home()
        .ok()
        .map(|dir| dir.join("coupler").join("config.toml"))
}
