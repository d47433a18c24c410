//! Result records
//!
//! A [`ResultRecord`] describes one completed plugin invocation: who ran, under
//! which name, with which parameters, and which files it read and produced. File
//! paths are kept relative to the record's base directory, which changes exactly
//! once when the engine relocates the files into a results database.

use crate::error::{ApiError, StorageError};
use crate::fsutil::move_path;
use crate::params::Parameters;
use crate::types::{JobId, Timestamp};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Version written into every result index file
pub const RESULT_FORMAT_VERSION: u32 = 1;

/// Suffix of the per-run log file written next to the inputs
pub const LOG_SUFFIX: &str = "_log.txt";

/// Log file name used by a plugin
pub fn log_file_name(plugin: &str) -> String {
    format!("{}{}", plugin, LOG_SUFFIX)
}

/// Identity of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecInfo {
    /// Assigned when the record is added to a database
    pub job_id: Option<JobId>,
    pub plugin: String,
    pub name: String,
    /// Start of the run, nanoseconds since the epoch
    pub timestamp: Timestamp,
}

impl ExecInfo {
    pub fn new(plugin: impl Into<String>, name: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            job_id: None,
            plugin: plugin.into(),
            name: name.into(),
            timestamp,
        }
    }
}

/// What kind of plugin produced a record, with any kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultKind {
    /// External program driven through templated inputs
    Generic,
    /// In-process function; `values` holds what it returned
    Function { values: Parameters },
}

impl ResultKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResultKind::Generic => "generic",
            ResultKind::Function { .. } => "function",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct IndexDocument {
    format_version: u32,
    exec_info: ExecInfo,
    parameters: Parameters,
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    result: ResultKind,
}

/// Immutable record of one plugin invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    exec_info: ExecInfo,
    parameters: Parameters,
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    base_path: PathBuf,
    kind: ResultKind,
}

/// Express `path` relative to `base`, rejecting anything that escapes it
fn relative_to(base: &Path, path: &Path) -> Result<PathBuf, ApiError> {
    let rel = if path.is_absolute() {
        path.strip_prefix(base)
            .map(Path::to_path_buf)
            .map_err(|_| {
                ApiError::InvalidResult(format!(
                    "{} is outside the run directory {}",
                    path.display(),
                    base.display()
                ))
            })?
    } else {
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    };
    if rel.as_os_str().is_empty() || rel.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ApiError::InvalidResult(format!(
            "invalid result file path: {}",
            path.display()
        )));
    }
    Ok(rel)
}

/// Relative forms of `paths`, each kept once in first-seen order
fn relative_unique(base: &Path, paths: &[PathBuf]) -> Result<Vec<PathBuf>, ApiError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let rel = relative_to(base, path)?;
        if seen.insert(rel.clone()) {
            out.push(rel);
        }
    }
    Ok(out)
}

impl ResultRecord {
    /// Build a record for files living under `base_path`
    ///
    /// Paths may be absolute (under `base_path`) or relative to it. Inputs and
    /// outputs must not overlap.
    pub fn new(
        exec_info: ExecInfo,
        parameters: Parameters,
        inputs: Vec<PathBuf>,
        outputs: Vec<PathBuf>,
        base_path: impl Into<PathBuf>,
        kind: ResultKind,
    ) -> Result<Self, ApiError> {
        let base_path = base_path.into();
        let inputs = relative_unique(&base_path, &inputs)?;
        let outputs = relative_unique(&base_path, &outputs)?;

        let input_set: HashSet<&PathBuf> = inputs.iter().collect();
        if let Some(shared) = outputs.iter().find(|p| input_set.contains(p)) {
            return Err(ApiError::InvalidResult(format!(
                "{} is listed as both input and output",
                shared.display()
            )));
        }

        Ok(Self {
            exec_info,
            parameters,
            inputs,
            outputs,
            base_path,
            kind,
        })
    }

    pub fn exec_info(&self) -> &ExecInfo {
        &self.exec_info
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.exec_info.job_id
    }

    pub(crate) fn set_job_id(&mut self, job_id: JobId) {
        self.exec_info.job_id = Some(job_id);
    }

    pub fn plugin(&self) -> &str {
        &self.exec_info.plugin
    }

    pub fn name(&self) -> &str {
        &self.exec_info.name
    }

    pub fn timestamp(&self) -> Timestamp {
        self.exec_info.timestamp
    }

    /// Start time of the run
    pub fn time(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.exec_info.timestamp)
    }

    /// Snapshot of the parameters the run was invoked with
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Input files relative to [`base_path`](Self::base_path)
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Output files relative to [`base_path`](Self::base_path)
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.inputs.iter().map(|p| self.base_path.join(p)).collect()
    }

    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.outputs.iter().map(|p| self.base_path.join(p)).collect()
    }

    /// Directory currently holding the record's files
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn kind(&self) -> &ResultKind {
        &self.kind
    }

    /// Values returned by an in-process plugin
    pub fn function_values(&self) -> Option<&Parameters> {
        match &self.kind {
            ResultKind::Function { values } => Some(values),
            ResultKind::Generic => None,
        }
    }

    /// Captured output of the run
    pub fn stdout(&self) -> Result<String, ApiError> {
        let path = self.base_path.join(log_file_name(self.plugin()));
        fs::read_to_string(&path).map_err(|e| ApiError::io(&path, e))
    }

    /// Relocate every input and output into `dst` and make it the base path
    pub fn move_files(&mut self, dst: &Path) -> Result<(), ApiError> {
        for rel in self.inputs.iter().chain(self.outputs.iter()) {
            let src = self.base_path.join(rel);
            let target = dst.join(rel);
            move_path(&src, &target).map_err(|source| ApiError::RelocationError {
                path: src.clone(),
                source,
            })?;
        }
        debug!(
            from = %self.base_path.display(),
            to = %dst.display(),
            files = self.inputs.len() + self.outputs.len(),
            "Relocated result files"
        );
        self.base_path = dst.to_path_buf();
        Ok(())
    }

    /// Write the index file for this record
    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        let doc = IndexDocument {
            format_version: RESULT_FORMAT_VERSION,
            exec_info: self.exec_info.clone(),
            parameters: self.parameters.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            result: self.kind.clone(),
        };
        let text = serde_json::to_string(&doc)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(path, text).map_err(|e| ApiError::io(path, e))
    }

    /// Load a record from its index file; the base path is the file's directory
    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let text = fs::read_to_string(path).map_err(|e| ApiError::io(path, e))?;
        let doc: IndexDocument = serde_json::from_str(&text).map_err(|e| {
            StorageError::Deserialization(format!("{}: {}", path.display(), e))
        })?;
        if doc.format_version > RESULT_FORMAT_VERSION {
            return Err(StorageError::Deserialization(format!(
                "{}: unsupported result format version {}",
                path.display(),
                doc.format_version
            ))
            .into());
        }
        let base_path = path
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?
            .to_path_buf();
        Self::new(
            doc.exec_info,
            doc.parameters,
            doc.inputs,
            doc.outputs,
            base_path,
            doc.result,
        )
    }
}
