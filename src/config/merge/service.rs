//! MergeService: orchestrates sources, applies merge policy, deserializes to CouplerConfig.

use crate::config::sources::{environment, global_file, project_file};
use crate::config::CouplerConfig;
use config::{ConfigError, File, FileFormat};
use std::path::Path;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config for a project.
    /// Precedence: defaults -> global file -> project file -> environment (highest).
    pub fn load(project_root: &Path) -> Result<CouplerConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = project_file::add_to_builder(builder, project_root)?;
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<CouplerConfig, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).format(FileFormat::Toml));
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}
