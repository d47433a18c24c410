//! Registry of open databases, one handle per canonical root path.

use super::Database;
use crate::error::ApiError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared handle to an open database
pub type DatabaseHandle = Arc<RwLock<Database>>;

/// Maps canonical root paths to open databases
///
/// Asking twice for the same directory, spelled relatively or absolutely,
/// returns the same handle, so job-id counters and indices stay consistent.
#[derive(Default)]
pub struct DatabaseRegistry {
    handles: RwLock<HashMap<PathBuf, DatabaseHandle>>,
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn canonical(path: &Path) -> Result<PathBuf, ApiError> {
        fs::create_dir_all(path).map_err(|e| ApiError::io(path, e))?;
        dunce::canonicalize(path).map_err(|e| ApiError::io(path, e))
    }

    /// Open the database at `path`, or return the handle already open for it
    pub fn get_or_create(&self, path: impl AsRef<Path>) -> Result<DatabaseHandle, ApiError> {
        let key = Self::canonical(path.as_ref())?;
        {
            let map = self.handles.read();
            if let Some(handle) = map.get(&key) {
                return Ok(handle.clone());
            }
        }

        let mut map = self.handles.write();
        if let Some(handle) = map.get(&key) {
            return Ok(handle.clone());
        }
        let handle = Arc::new(RwLock::new(Database::open(&key)?));
        map.insert(key, handle.clone());
        Ok(handle)
    }

    /// Handle for `path` if it has been opened through this registry
    pub fn get(&self, path: impl AsRef<Path>) -> Option<DatabaseHandle> {
        let key = dunce::canonicalize(path.as_ref()).ok()?;
        self.handles.read().get(&key).cloned()
    }

    /// Number of open databases
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

impl std::fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("paths", &self.handles.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
