//! Results database
//!
//! A directory holding one subdirectory per result. Each subdirectory carries its
//! own index file, so the database is rebuilt by scanning subdirectories; there is
//! no master index.
//!
//! Job ids: on open the next id is `max(existing) + 1` (0 when empty) and it only
//! grows for the rest of the session. Ids are unique within a session; after a
//! restart, an id freed by removing the newest result can be handed out again.

mod format;
mod registry;

pub use format::format_results_table;
pub use registry::{DatabaseHandle, DatabaseRegistry};

use crate::error::ApiError;
use crate::results::ResultRecord;
use crate::types::{JobId, DEFAULT_RUN_NAME, RESULT_INDEX_FILE};
use std::fs;
use std::io;
use std::ops::Index;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Criteria for [`Database::query`]; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub job_id: Option<JobId>,
    pub plugin: Option<String>,
    pub name: Option<String>,
}

impl ResultFilter {
    pub fn matches(&self, record: &ResultRecord) -> bool {
        self.job_id.map_or(true, |id| record.job_id() == Some(id))
            && self.plugin.as_deref().map_or(true, |p| record.plugin() == p)
            && self.name.as_deref().map_or(true, |n| record.name() == n)
    }
}

/// Index of all results stored under one root directory
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    results: Vec<ResultRecord>,
    next_job_id: JobId,
}

fn dir_time(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.created().or_else(|_| m.modified()))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Directory name derived from a run name
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        DEFAULT_RUN_NAME.to_string()
    } else {
        cleaned
    }
}

impl Database {
    /// Open (creating if needed) the database rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| ApiError::io(path, e))?;
        let path = dunce::canonicalize(path).map_err(|e| ApiError::io(path, e))?;

        let mut loaded: Vec<(SystemTime, ResultRecord)> = Vec::new();
        let entries = fs::read_dir(&path).map_err(|e| ApiError::io(&path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ApiError::io(&path, e))?;
            let dir = entry.path();
            let index = dir.join(RESULT_INDEX_FILE);
            if !dir.is_dir() || !index.is_file() {
                continue;
            }
            match ResultRecord::from_file(&index) {
                Ok(record) => loaded.push((dir_time(&dir), record)),
                Err(e) => {
                    warn!(path = %index.display(), error = %e, "Skipping unreadable result index")
                }
            }
        }
        loaded.sort_by(|(ta, a), (tb, b)| ta.cmp(tb).then_with(|| a.job_id().cmp(&b.job_id())));
        let results: Vec<ResultRecord> = loaded.into_iter().map(|(_, r)| r).collect();
        let next_job_id = results
            .iter()
            .filter_map(ResultRecord::job_id)
            .max()
            .map_or(0, |max| max + 1);

        debug!(path = %path.display(), results = results.len(), next_job_id, "Opened results database");
        Ok(Self {
            path,
            results,
            next_job_id,
        })
    }

    /// Canonical root directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results in the order they were added
    pub fn iter(&self) -> std::slice::Iter<'_, ResultRecord> {
        self.results.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ResultRecord> {
        self.results.get(index)
    }

    pub fn last(&self) -> Option<&ResultRecord> {
        self.results.last()
    }

    /// Id the next added result will receive
    pub fn next_job_id(&self) -> JobId {
        self.next_job_id
    }

    /// Highest job id currently present
    pub fn last_job_id(&self) -> Option<JobId> {
        self.results.iter().filter_map(ResultRecord::job_id).max()
    }

    /// Matching results with their positions
    pub fn query(&self, filter: &ResultFilter) -> Vec<(usize, &ResultRecord)> {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, r)| filter.matches(r))
            .collect()
    }

    /// Create a fresh directory for a run: `name`, then `name_1`, `name_2`, ...
    pub fn allocate_result_dir(&self, name: &str) -> Result<PathBuf, ApiError> {
        let base = sanitize_name(name);
        let mut suffix = 0usize;
        loop {
            let candidate = if suffix == 0 {
                self.path.join(&base)
            } else {
                self.path.join(format!("{}_{}", base, suffix))
            };
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(ApiError::io(&candidate, e)),
            }
        }
    }

    /// Create exactly `name` as a direct child of the root; fails if it already exists
    ///
    /// Results are only discovered one level below the root, so nested names are
    /// rejected.
    pub fn create_result_dir(&self, name: &Path) -> Result<PathBuf, ApiError> {
        let mut components = name.components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single {
            return Err(ApiError::InvalidResult(format!(
                "result directory must be a single directory name inside the database: {}",
                name.display()
            )));
        }
        let target = self.path.join(name);
        match fs::create_dir(&target) {
            Ok(()) => Ok(target),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(ApiError::ResultExists(target))
            }
            Err(e) => Err(ApiError::io(&target, e)),
        }
    }

    /// Register a record whose files already live under the root
    ///
    /// Assigns the next job id and writes the record's index file.
    pub fn add(&mut self, mut record: ResultRecord) -> Result<&ResultRecord, ApiError> {
        if !record.base_path().starts_with(&self.path) || record.base_path() == self.path {
            return Err(ApiError::InvalidResult(format!(
                "result files at {} are not inside database {}",
                record.base_path().display(),
                self.path.display()
            )));
        }
        let job_id = self.next_job_id;
        record.set_job_id(job_id);
        record.save(&record.base_path().join(RESULT_INDEX_FILE))?;
        self.next_job_id += 1;
        info!(
            job_id,
            plugin = %record.plugin(),
            name = %record.name(),
            path = %record.base_path().display(),
            "Added result"
        );
        self.results.push(record);
        Ok(&self.results[self.results.len() - 1])
    }

    /// Delete a result's directory and drop it from the index
    pub fn remove(&mut self, record: &ResultRecord) -> Result<ResultRecord, ApiError> {
        let index = self
            .results
            .iter()
            .position(|r| r.job_id() == record.job_id() && r.base_path() == record.base_path())
            .ok_or_else(|| {
                ApiError::ResultNotFound(format!(
                    "{} ({})",
                    record.name(),
                    record.base_path().display()
                ))
            })?;
        self.remove_at(index)
    }

    /// Delete the result at `index`
    pub fn remove_at(&mut self, index: usize) -> Result<ResultRecord, ApiError> {
        let record = self.results.get(index).ok_or_else(|| {
            ApiError::ResultNotFound(format!(
                "index {} (database has {} results)",
                index,
                self.results.len()
            ))
        })?;
        remove_dir_if_present(record.base_path())?;
        let record = self.results.remove(index);
        info!(job_id = ?record.job_id(), path = %record.base_path().display(), "Removed result");
        Ok(record)
    }

    /// Delete every result
    pub fn clear(&mut self) -> Result<(), ApiError> {
        while let Some(record) = self.results.last() {
            remove_dir_if_present(record.base_path())?;
            self.results.pop();
        }
        info!(path = %self.path.display(), "Cleared results database");
        Ok(())
    }

    /// Table of all results
    pub fn summary(&self) -> String {
        format_results_table(self.results.iter().enumerate())
    }
}

fn remove_dir_if_present(path: &Path) -> Result<(), ApiError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ApiError::io(path, e)),
    }
}

impl Index<usize> for Database {
    type Output = ResultRecord;

    fn index(&self, index: usize) -> &ResultRecord {
        &self.results[index]
    }
}

impl<'a> IntoIterator for &'a Database {
    type Item = &'a ResultRecord;
    type IntoIter = std::slice::Iter<'a, ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
