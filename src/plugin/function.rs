//! Plugin calling a Rust function in-process.

use super::{collect_outputs, Plugin, PluginOptions, RunArgs, RunContext};
use crate::error::ApiError;
use crate::params::Parameters;
use crate::process::OutputSink;
use crate::results::{ExecInfo, ResultKind, ResultRecord};
use std::path::Path;

/// Function invoked by [`FunctionPlugin`]
///
/// Receives the unit-converted parameters and the working directory, and returns
/// the values to record. Files it writes into the directory become outputs.
pub type PluginFunction = Box<dyn FnMut(&Parameters, &Path) -> Result<Parameters, ApiError>>;

pub struct FunctionPlugin {
    name: String,
    function: PluginFunction,
    options: PluginOptions,
    converted: Option<Parameters>,
    values: Option<Parameters>,
}

impl FunctionPlugin {
    pub fn new<F>(function: F) -> Self
    where
        F: FnMut(&Parameters, &Path) -> Result<Parameters, ApiError> + 'static,
    {
        Self {
            name: "function".to_string(),
            function: Box::new(function),
            options: PluginOptions::default(),
            converted: None,
            values: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_options(mut self, options: PluginOptions) -> Self {
        self.options = options;
        self
    }
}

impl std::fmt::Debug for FunctionPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionPlugin")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Plugin for FunctionPlugin {
    fn plugin_name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> &PluginOptions {
        &self.options
    }

    fn prerun(&mut self, params: &Parameters, _ctx: &RunContext) -> Result<(), ApiError> {
        self.converted = Some(
            params.convert_units(self.options.unit_system, self.options.temperature_unit)?,
        );
        self.values = None;
        Ok(())
    }

    fn run(
        &mut self,
        ctx: &RunContext,
        _args: &RunArgs,
        _sink: &dyn OutputSink,
    ) -> Result<(), ApiError> {
        let converted = self.converted.take().unwrap_or_default();
        self.values = Some((self.function)(&converted, ctx.workdir())?);
        Ok(())
    }

    fn postrun(&mut self, params: &Parameters, ctx: &RunContext) -> Result<ResultRecord, ApiError> {
        let values = self.values.take().ok_or_else(|| {
            ApiError::HarvestError(format!("{} produced no values; run did not complete", self.name))
        })?;
        let inputs = self.options.extra_input_names();
        let outputs = collect_outputs(ctx.workdir(), &inputs)?;
        ResultRecord::new(
            ExecInfo::new(&self.name, ctx.name(), ctx.start()),
            params.clone(),
            inputs,
            outputs,
            ctx.workdir(),
            ResultKind::Function { values },
        )
    }
}
