//! Filesystem helpers: scoped working directory, cross-device moves, staging copies.

use crate::error::ApiError;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error};
use walkdir::WalkDir;

static WORKING_DIRECTORY: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Serializes changes of the process working directory
///
/// The engine holds this for the whole time it has switched directories. Code that
/// reads the working directory while plugins may run on other threads takes it too.
pub fn working_directory_lock() -> ReentrantMutexGuard<'static, ()> {
    WORKING_DIRECTORY.lock()
}

/// `path` made absolute against the current working directory
pub fn absolute_path(path: &Path) -> Result<PathBuf, ApiError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| ApiError::ConfigError(format!("Failed to read current directory: {}", e)))?;
    Ok(cwd.join(path))
}

/// A fresh temporary directory that is the working directory while this guard lives
///
/// Dropping the guard restores the original working directory and then deletes
/// the temporary directory, on every exit path.
pub struct ScopedWorkdir {
    dir: TempDir,
    path: PathBuf,
    original: PathBuf,
    _lock: ReentrantMutexGuard<'static, ()>,
}

impl ScopedWorkdir {
    pub fn enter() -> Result<Self, ApiError> {
        let lock = working_directory_lock();
        let original = std::env::current_dir()
            .map_err(|e| ApiError::io(Path::new("."), e))?;
        let dir = TempDir::new().map_err(|e| ApiError::io(&std::env::temp_dir(), e))?;
        let path = dunce::canonicalize(dir.path()).map_err(|e| ApiError::io(dir.path(), e))?;
        std::env::set_current_dir(&path).map_err(|e| ApiError::io(&path, e))?;
        debug!(workdir = %path.display(), "Entered scoped working directory");
        Ok(Self {
            dir,
            path,
            original,
            _lock: lock,
        })
    }

    /// Canonical path of the temporary directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that was current before entering
    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for ScopedWorkdir {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.original) {
            error!(
                original = %self.original.display(),
                error = %e,
                "Failed to restore working directory"
            );
        }
        debug!(workdir = %self.dir.path().display(), "Leaving scoped working directory");
    }
}

/// Copy a directory tree; `dst` is created
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move a file or directory, falling back to copy and delete across filesystems
pub fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            let meta = fs::symlink_metadata(src).map_err(|_| rename_err)?;
            if meta.is_dir() {
                copy_dir_all(src, dst)?;
                fs::remove_dir_all(src)
            } else {
                fs::copy(src, dst)?;
                fs::remove_file(src)
            }
        }
    }
}

/// Copy a file or directory into `dir`, keeping its name; returns the new path
pub fn copy_into(src: &Path, dir: &Path) -> Result<PathBuf, ApiError> {
    let name = src.file_name().ok_or_else(|| {
        ApiError::ConfigError(format!("Input path has no file name: {}", src.display()))
    })?;
    let dst = dir.join(name);
    let result = if src.is_dir() {
        copy_dir_all(src, &dst)
    } else {
        fs::copy(src, &dst).map(|_| ())
    };
    result.map_err(|e| ApiError::io(src, e))?;
    Ok(dst)
}
