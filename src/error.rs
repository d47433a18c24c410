//! Error types for the coupler workflow engine.

use std::path::PathBuf;
use thiserror::Error;

/// Storage-layer errors (filesystem, serialization of persisted state)
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Errors surfaced by every public operation of the crate
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter not found: {0}")]
    KeyNotFound(String),

    #[error("Unit error for '{unit}': {message}")]
    UnitError { unit: String, message: String },

    #[error("Undefined variable(s) {} in template {}", .names.join(", "), .template.display())]
    UndefinedVariable { template: PathBuf, names: Vec<String> },

    #[error("Template error in {}: {message}", .template.display())]
    TemplateError { template: PathBuf, message: String },

    #[error("Execution of '{program}' failed: {status}")]
    ExecutionError { program: String, status: String },

    #[error("Harvest error: {0}")]
    HarvestError(String),

    #[error("Invalid result: {0}")]
    InvalidResult(String),

    #[error("Failed to relocate {}: {source}", .path.display())]
    RelocationError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Result directory already exists: {}", .0.display())]
    ResultExists(PathBuf),

    #[error("Result not found: {0}")]
    ResultNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl ApiError {
    /// Wrap an I/O error that happened while touching `path`
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        ApiError::StorageError(StorageError::IoError(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.display(), err),
        )))
    }
}
