//! Plugin driving an external executable through templated input files.

use super::{collect_outputs, Plugin, PluginOptions, RunArgs, RunContext};
use crate::error::ApiError;
use crate::params::Parameters;
use crate::process::{describe_status, find_executable, run_command, OutputSink};
use crate::results::{ExecInfo, ResultKind, ResultRecord};
use crate::template::Template;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default name of the rendered main input
pub const DEFAULT_INPUT_NAME: &str = "input_rendered";

const EXECUTABLE_PLACEHOLDER: &str = "{executable}";
const INPUT_PLACEHOLDER: &str = "{input_name}";

/// Renders templates, runs an executable on them, and collects what it writes
#[derive(Debug, Clone)]
pub struct GenericPlugin {
    name: String,
    executable: PathBuf,
    command: Vec<String>,
    template: Template,
    extra_templates: Vec<Template>,
    input_name: String,
    expected_outputs: Vec<PathBuf>,
    options: PluginOptions,
}

fn resolve_executable(executable: &Path) -> Result<PathBuf, ApiError> {
    let name = executable.to_string_lossy();
    find_executable(&name)
        .ok_or_else(|| ApiError::ConfigError(format!("Executable '{}' is missing", name)))
}

impl GenericPlugin {
    /// Plugin running `executable` on the rendered `template_file`
    ///
    /// The executable is looked up on `PATH` immediately. The default command is
    /// `{executable} {input_name}`.
    pub fn new(
        template_file: impl AsRef<Path>,
        executable: impl AsRef<Path>,
    ) -> Result<Self, ApiError> {
        let executable = resolve_executable(executable.as_ref())?;
        let name = executable
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Generic".to_string());
        Ok(Self {
            name,
            executable,
            command: vec![
                EXECUTABLE_PLACEHOLDER.to_string(),
                INPUT_PLACEHOLDER.to_string(),
            ],
            template: Template::from_file(template_file)?,
            extra_templates: Vec::new(),
            input_name: DEFAULT_INPUT_NAME.to_string(),
            expected_outputs: Vec::new(),
            options: PluginOptions::default(),
        })
    }

    /// Plugin whose executable lives under the directory named by env var `var`
    pub fn from_env(
        var: &str,
        relative_executable: impl AsRef<Path>,
        template_file: impl AsRef<Path>,
    ) -> Result<Self, ApiError> {
        let root = std::env::var_os(var).filter(|v| !v.is_empty()).ok_or_else(|| {
            ApiError::ConfigError(format!("Environment variable {} is not set", var))
        })?;
        Self::new(template_file, PathBuf::from(root).join(relative_executable))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Command tokens; `{executable}` and `{input_name}` are substituted
    pub fn with_command<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Command as one whitespace-separated string
    pub fn with_command_line(self, line: &str) -> Self {
        self.with_command(line.split_whitespace())
    }

    /// Additional templates, each rendered under its own file name
    pub fn with_extra_templates<I, P>(mut self, files: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for file in files {
            self.extra_templates.push(Template::from_file(file)?);
        }
        Ok(self)
    }

    pub fn with_input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = name.into();
        self
    }

    /// Files `postrun` requires the run to have produced
    pub fn with_expected_outputs<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.expected_outputs = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: PluginOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options_mut(&mut self) -> &mut PluginOptions {
        &mut self.options
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Command line with placeholders substituted
    pub fn execute_command(&self) -> Vec<String> {
        let exe = self.executable.to_string_lossy();
        self.command
            .iter()
            .map(|token| {
                token
                    .replace(EXECUTABLE_PLACEHOLDER, &exe)
                    .replace(INPUT_PLACEHOLDER, &self.input_name)
            })
            .collect()
    }

    /// Names of every file the plugin places in the working directory before running
    ///
    /// Each name appears once, in first-seen order.
    pub fn input_files(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        std::iter::once(PathBuf::from(&self.input_name))
            .chain(self.options.extra_input_names())
            .chain(
                self.extra_templates
                    .iter()
                    .map(|t| PathBuf::from(t.file_name())),
            )
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }
}

impl Plugin for GenericPlugin {
    fn plugin_name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> &PluginOptions {
        &self.options
    }

    fn prerun(&mut self, params: &Parameters, ctx: &RunContext) -> Result<(), ApiError> {
        let converted =
            params.convert_units(self.options.unit_system, self.options.temperature_unit)?;
        self.template
            .render_to(&converted, &ctx.workdir().join(&self.input_name))?;
        for template in &self.extra_templates {
            template.render_to(&converted, &ctx.workdir().join(template.file_name()))?;
        }
        Ok(())
    }

    fn run(
        &mut self,
        ctx: &RunContext,
        args: &RunArgs,
        sink: &dyn OutputSink,
    ) -> Result<(), ApiError> {
        let mut argv = args.mpi_args.clone();
        argv.extend(self.execute_command());
        argv.extend(args.extra_args.iter().cloned());

        let status = run_command(&argv, ctx.workdir(), sink)?;
        if !status.success() {
            let description = describe_status(&status);
            if self.options.fail_on_nonzero_exit {
                return Err(ApiError::ExecutionError {
                    program: self.executable.display().to_string(),
                    status: description,
                });
            }
            warn!(
                plugin = %self.name,
                status = %description,
                "External program exited unsuccessfully"
            );
        }
        Ok(())
    }

    fn postrun(&mut self, params: &Parameters, ctx: &RunContext) -> Result<ResultRecord, ApiError> {
        let missing: Vec<String> = self
            .expected_outputs
            .iter()
            .filter(|p| !ctx.workdir().join(p).exists())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::HarvestError(format!(
                "{} did not produce expected output(s): {}",
                self.name,
                missing.join(", ")
            )));
        }

        let inputs = self.input_files();
        let outputs = collect_outputs(ctx.workdir(), &inputs)?;
        ResultRecord::new(
            ExecInfo::new(&self.name, ctx.name(), ctx.start()),
            params.clone(),
            inputs,
            outputs,
            ctx.workdir(),
            ResultKind::Generic,
        )
    }
}
