//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::CouplerConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project rooted at `project_root`.
    pub fn load(project_root: &Path) -> Result<CouplerConfig, ApiError> {
        let config = MergeService::load(project_root)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<CouplerConfig, ApiError> {
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> CouplerConfig {
        CouplerConfig::default()
    }
}
