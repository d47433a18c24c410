//! DatabaseConfig and default results location.

use crate::config::xdg;
use crate::error::ApiError;
use crate::fsutil::absolute_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Results database configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Root of the default results database; relative paths resolve against the
    /// project root. None uses `$XDG_DATA_HOME/coupler/results`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Absolute path of the default database
    pub fn resolve_path(&self, project_root: &Path) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) => Ok(absolute_path(project_root)?.join(path)),
            None => xdg::default_results_dir(),
        }
    }
}
