//! Configuration
//!
//! Layered with the `config` crate. Precedence, lowest first: built-in defaults,
//! global file (`$XDG_CONFIG_HOME/coupler/config.toml`), project file
//! (`<root>/coupler.toml`), environment (`COUPLER_` prefix, `__` between levels,
//! e.g. `COUPLER_DATABASE__PATH`).

mod database;
mod facade;
mod merge;
pub mod paths;
mod sources;

pub use database::DatabaseConfig;
pub use facade::ConfigLoader;
pub(crate) use paths::xdg_root as xdg;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::units::{TemperatureUnit, UnitSystem};
use serde::{Deserialize, Serialize};

/// Name of the per-project configuration file
pub const PROJECT_CONFIG_FILE: &str = "coupler.toml";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "COUPLER";

/// Defaults applied to plugins created from a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDefaults {
    #[serde(default)]
    pub unit_system: UnitSystem,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    #[serde(default)]
    pub show_stdout: bool,
    #[serde(default)]
    pub show_stderr: bool,
}

impl Default for PluginDefaults {
    fn default() -> Self {
        Self {
            unit_system: UnitSystem::Si,
            temperature_unit: TemperatureUnit::Kelvin,
            show_stdout: false,
            show_stderr: false,
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouplerConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub plugins: PluginDefaults,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CouplerConfig {
    /// Reject values that deserialize but cannot be used
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(path) = &self.database.path {
            if path.as_os_str().is_empty() {
                return Err(ApiError::ConfigError(
                    "database.path must not be empty".to_string(),
                ));
            }
        }
        match self.logging.format.as_str() {
            "json" | "text" => {}
            other => {
                return Err(ApiError::ConfigError(format!(
                    "Invalid log format: {} (must be 'json' or 'text')",
                    other
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let config = CouplerConfig::default();
        assert_eq!(config.database.path, None);
        assert_eq!(config.plugins.unit_system, UnitSystem::Si);
        assert_eq!(config.plugins.temperature_unit, TemperatureUnit::Kelvin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: CouplerConfig = toml::from_str(
            r#"
            [database]
            path = "/srv/results"

            [plugins]
            unit_system = "cgs"
            temperature_unit = "degC"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, Some(PathBuf::from("/srv/results")));
        assert_eq!(config.plugins.unit_system, UnitSystem::Cgs);
        assert_eq!(config.plugins.temperature_unit, TemperatureUnit::Celsius);
        assert!(!config.plugins.show_stdout);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_validate_empty_path() {
        let mut config = CouplerConfig::default();
        config.database.path = Some(PathBuf::new());
        assert!(config.validate().is_err());
    }
}
