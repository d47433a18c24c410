//! Workflow context: default database location, open databases and plugin defaults.
//!
//! One context is built at start-up (usually from [`CouplerConfig`]) and handed to
//! whatever runs plugins. It replaces process-wide state: two contexts never share
//! a registry, and the default database path is an ordinary field.

use crate::config::{CouplerConfig, PluginDefaults};
use crate::database::{DatabaseHandle, DatabaseRegistry};
use crate::error::ApiError;
use crate::fsutil::absolute_path;
use crate::params::Parameters;
use crate::plugin::{Engine, Plugin, PluginOptions, RunRequest};
use crate::results::ResultRecord;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct WorkflowContext {
    default_database_path: PathBuf,
    registry: DatabaseRegistry,
    plugin_defaults: PluginDefaults,
}

impl WorkflowContext {
    /// Context whose default database lives at `default_database_path`
    pub fn new(default_database_path: impl AsRef<Path>) -> Result<Self, ApiError> {
        Ok(Self {
            default_database_path: absolute_path(default_database_path.as_ref())?,
            registry: DatabaseRegistry::new(),
            plugin_defaults: PluginDefaults::default(),
        })
    }

    /// Context from loaded configuration; relative database paths resolve against
    /// `project_root`
    pub fn from_config(config: &CouplerConfig, project_root: &Path) -> Result<Self, ApiError> {
        let path = config.database.resolve_path(project_root)?;
        debug!(path = %path.display(), "Default results database");
        Ok(Self {
            default_database_path: path,
            registry: DatabaseRegistry::new(),
            plugin_defaults: config.plugins.clone(),
        })
    }

    /// Change where `database(None)` points; relative paths are made absolute now
    pub fn set_default_path(&mut self, path: impl AsRef<Path>) -> Result<(), ApiError> {
        self.default_database_path = absolute_path(path.as_ref())?;
        Ok(())
    }

    pub fn default_path(&self) -> &Path {
        &self.default_database_path
    }

    pub fn registry(&self) -> &DatabaseRegistry {
        &self.registry
    }

    pub fn plugin_defaults(&self) -> &PluginDefaults {
        &self.plugin_defaults
    }

    /// Options for a new plugin, seeded from the configured defaults
    pub fn plugin_options(&self) -> PluginOptions {
        PluginOptions::from_defaults(&self.plugin_defaults)
    }

    /// Database at `path`, or the default database when `path` is None
    pub fn database(&self, path: Option<&Path>) -> Result<DatabaseHandle, ApiError> {
        self.registry
            .get_or_create(path.unwrap_or(&self.default_database_path))
    }

    /// Engine registering results in the database at `path` (default when None)
    pub fn engine(&self, path: Option<&Path>) -> Result<Engine, ApiError> {
        Ok(Engine::new(self.database(path)?))
    }

    /// Run `plugin` against the default database
    pub fn run(
        &self,
        plugin: &mut dyn Plugin,
        params: Option<&Parameters>,
        request: &RunRequest,
    ) -> Result<ResultRecord, ApiError> {
        self.engine(None)?.run(plugin, params, request)
    }
}
