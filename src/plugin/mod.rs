//! Plugins
//!
//! A plugin drives one simulation code through three phases: `prerun` renders
//! inputs into the working directory, `run` executes the code, `postrun` collects
//! outputs into a [`ResultRecord`]. The [`Engine`] owns everything around the
//! phases: the scoped working directory, staging, the per-run log, result
//! placement and database registration.

pub mod engine;
mod function;
mod generic;

pub use engine::{Engine, RunRequest};
pub use function::{FunctionPlugin, PluginFunction};
pub use generic::GenericPlugin;

use crate::config::PluginDefaults;
use crate::error::ApiError;
use crate::params::Parameters;
use crate::process::OutputSink;
use crate::results::ResultRecord;
use crate::types::Timestamp;
use crate::units::{TemperatureUnit, UnitSystem};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings shared by every plugin
#[derive(Debug, Clone, PartialEq)]
pub struct PluginOptions {
    /// Non-templated files copied into the working directory before `prerun`
    pub extra_inputs: Vec<PathBuf>,
    pub show_stdout: bool,
    pub show_stderr: bool,
    pub unit_system: UnitSystem,
    pub temperature_unit: TemperatureUnit,
    /// Treat a non-zero exit of the external program as an error
    pub fail_on_nonzero_exit: bool,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            extra_inputs: Vec::new(),
            show_stdout: false,
            show_stderr: false,
            unit_system: UnitSystem::Si,
            temperature_unit: TemperatureUnit::Kelvin,
            fail_on_nonzero_exit: true,
        }
    }
}

impl PluginOptions {
    /// Options seeded from configured defaults
    pub fn from_defaults(defaults: &PluginDefaults) -> Self {
        Self {
            show_stdout: defaults.show_stdout,
            show_stderr: defaults.show_stderr,
            unit_system: defaults.unit_system,
            temperature_unit: defaults.temperature_unit,
            ..Self::default()
        }
    }

    /// File names the staged extra inputs have inside the working directory
    pub fn extra_input_names(&self) -> Vec<PathBuf> {
        self.extra_inputs
            .iter()
            .filter_map(|p| p.file_name().map(PathBuf::from))
            .collect()
    }
}

/// Arguments for the `run` phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Launcher placed before the command, e.g. `mpiexec -n 8`
    pub mpi_args: Vec<String>,
    /// Appended after the command
    pub extra_args: Vec<String>,
}

/// Per-invocation state handed to every phase
#[derive(Debug, Clone)]
pub struct RunContext {
    workdir: PathBuf,
    name: String,
    start: Timestamp,
    log_file: String,
}

impl RunContext {
    pub fn new(
        workdir: impl Into<PathBuf>,
        name: impl Into<String>,
        start: Timestamp,
        log_file: impl Into<String>,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            name: name.into(),
            start,
            log_file: log_file.into(),
        }
    }

    /// Scoped working directory of this run
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run name given by the caller
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start time, recorded just before `prerun`
    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }
}

/// The three-phase contract every simulation plugin implements
pub trait Plugin {
    /// Name used in logs, log file names and result records
    fn plugin_name(&self) -> &str;

    fn options(&self) -> &PluginOptions;

    /// Render inputs into `ctx.workdir()`; must not modify `params`
    fn prerun(&mut self, params: &Parameters, ctx: &RunContext) -> Result<(), ApiError>;

    /// Execute, sending program output to `sink`
    fn run(
        &mut self,
        ctx: &RunContext,
        args: &RunArgs,
        sink: &dyn OutputSink,
    ) -> Result<(), ApiError>;

    /// Classify files and build the record of this run
    fn postrun(&mut self, params: &Parameters, ctx: &RunContext) -> Result<ResultRecord, ApiError>;
}

/// Top-level entries of `workdir` that are not inputs, sorted by name
pub fn collect_outputs(workdir: &Path, inputs: &[PathBuf]) -> Result<Vec<PathBuf>, ApiError> {
    let known: HashSet<&Path> = inputs.iter().map(PathBuf::as_path).collect();
    let mut outputs = Vec::new();
    for entry in fs::read_dir(workdir).map_err(|e| ApiError::io(workdir, e))? {
        let entry = entry.map_err(|e| ApiError::io(workdir, e))?;
        let name = PathBuf::from(entry.file_name());
        if !known.contains(name.as_path()) {
            outputs.push(name);
        }
    }
    outputs.sort();
    Ok(outputs)
}
