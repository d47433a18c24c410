//! Merge policy: built-in defaults form the lowest layer; later sources override
//! individual keys, never whole sections.

use crate::config::CouplerConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the serialized default configuration.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&CouplerConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
