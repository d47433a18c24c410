//! Project config file source: <root>/coupler.toml (optional)

use crate::config::PROJECT_CONFIG_FILE;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

/// Add the project's config file, if present, to builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    project_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = project_root.join(PROJECT_CONFIG_FILE);
    if !path.is_file() {
        return Ok(builder);
    }
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
}
