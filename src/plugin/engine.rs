//! Plugin invocation: the one entry point callers use to run a plugin.
//!
//! Phases run strictly in order inside a scoped temporary working directory:
//! staging, `prerun`, `run`, `postrun`. The result files are then moved into a
//! fresh directory of the results database and the record is registered. The
//! original working directory is restored on every exit path, and a result
//! directory whose relocation fails is deleted before the error propagates.

use super::{Plugin, RunArgs, RunContext};
use crate::database::DatabaseHandle;
use crate::error::ApiError;
use crate::fsutil::{copy_into, ScopedWorkdir};
use crate::params::Parameters;
use crate::process::Tee;
use crate::results::{log_file_name, ResultRecord};
use crate::types::{now_ns, DEFAULT_RUN_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span};

/// How a single invocation should be named and placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Run name; also the first choice of result directory name
    pub name: String,
    /// Exact result directory name directly under the database root; must not exist yet
    pub output_dir: Option<PathBuf>,
    pub args: RunArgs,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            name: DEFAULT_RUN_NAME.to_string(),
            output_dir: None,
            args: RunArgs::default(),
        }
    }
}

impl RunRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_args(mut self, args: RunArgs) -> Self {
        self.args = args;
        self
    }
}

/// Runs plugins and registers their results in one database
#[derive(Clone)]
pub struct Engine {
    database: DatabaseHandle,
}

fn discard_dir(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        error!(path = %dir.display(), error = %e, "Failed to remove incomplete result directory");
    }
}

impl Engine {
    pub fn new(database: DatabaseHandle) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &DatabaseHandle {
        &self.database
    }

    /// Run all phases of `plugin` and register the result
    ///
    /// Without `params` an empty store is used.
    pub fn run(
        &self,
        plugin: &mut dyn Plugin,
        params: Option<&Parameters>,
        request: &RunRequest,
    ) -> Result<ResultRecord, ApiError> {
        let empty = Parameters::new();
        let params = params.unwrap_or(&empty);
        let plugin_name = plugin.plugin_name().to_string();
        let span = info_span!("plugin", plugin = %plugin_name, run = %request.name);
        let _enter = span.enter();

        let scope = ScopedWorkdir::enter()?;
        let workdir = scope.path().to_path_buf();

        for extra in &plugin.options().extra_inputs {
            let source = if extra.is_absolute() {
                extra.clone()
            } else {
                scope.original().join(extra)
            };
            copy_into(&source, &workdir)?;
        }

        let ctx = RunContext::new(
            &workdir,
            &request.name,
            now_ns(),
            log_file_name(&plugin_name),
        );

        info!("Calling prerun() for {} plugin", plugin_name);
        plugin.prerun(params, &ctx)?;

        info!("Calling run() for {} plugin", plugin_name);
        {
            let options = plugin.options();
            let sink = Tee::to_file(&workdir.join(ctx.log_file()))?
                .echo_stdout(options.show_stdout)
                .echo_stderr(options.show_stderr);
            plugin.run(&ctx, &request.args, &sink)?;
        }

        info!("Calling postrun() for {} plugin", plugin_name);
        let mut record = plugin.postrun(params, &ctx)?;

        let destination = {
            let db = self.database.read();
            match &request.output_dir {
                Some(dir) => db.create_result_dir(dir)?,
                None => db.allocate_result_dir(&request.name)?,
            }
        };
        if let Err(e) = record.move_files(&destination) {
            discard_dir(&destination);
            return Err(e);
        }
        drop(scope);

        let mut db = self.database.write();
        match db.add(record) {
            Ok(added) => Ok(added.clone()),
            Err(e) => {
                discard_dir(&destination);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database.read().path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseRegistry;
    use crate::fsutil::working_directory_lock;
    use crate::plugin::FunctionPlugin;
    use tempfile::TempDir;

    #[test]
    fn test_request_defaults() {
        let request = RunRequest::default();
        assert_eq!(request.name, "Workflow");
        assert!(request.output_dir.is_none());
        let named = RunRequest::named("case").with_output_dir("exact");
        assert_eq!(named.output_dir, Some(PathBuf::from("exact")));
    }

    #[test]
    fn test_function_plugin_through_engine() {
        let _lock = working_directory_lock();
        let tmp = TempDir::new().unwrap();
        let registry = DatabaseRegistry::new();
        let engine = Engine::new(registry.get_or_create(tmp.path().join("db")).unwrap());

        let mut plugin = FunctionPlugin::new(|params, dir| {
            fs::write(dir.join("echo.txt"), params.get("x")?.to_string()).unwrap();
            Ok(Parameters::from_map([("ok", true)]))
        });
        let params = Parameters::from_map([("x", 3)]);
        let record = engine
            .run(&mut plugin, Some(&params), &RunRequest::named("calc"))
            .unwrap();

        assert_eq!(record.job_id(), Some(0));
        assert_eq!(record.base_path().file_name().unwrap(), "calc");
        assert_eq!(
            fs::read_to_string(record.base_path().join("echo.txt")).unwrap(),
            "3"
        );
        assert!(record.base_path().join("function_log.txt").is_file());
        assert_eq!(engine.database().read().len(), 1);
    }

    #[test]
    fn test_existing_output_dir_rejected() {
        let _lock = working_directory_lock();
        let tmp = TempDir::new().unwrap();
        let registry = DatabaseRegistry::new();
        let handle = registry.get_or_create(tmp.path()).unwrap();
        let engine = Engine::new(handle.clone());
        let request = RunRequest::named("a").with_output_dir("fixed");

        let mut plugin = FunctionPlugin::new(|_, _| Ok(Parameters::new()));
        engine.run(&mut plugin, None, &request).unwrap();
        let err = engine.run(&mut plugin, None, &request).unwrap_err();
        assert!(matches!(err, ApiError::ResultExists(_)));
        assert_eq!(handle.read().len(), 1);
    }
}
