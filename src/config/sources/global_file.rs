//! Global config file source: $XDG_CONFIG_HOME/coupler/config.toml (optional)

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};

/// Add the global config file, if present, to builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = xdg::global_config_path() else {
        return Ok(builder);
    };
    if !path.is_file() {
        return Ok(builder);
    }
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
}
