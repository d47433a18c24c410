use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use coupler::error::ApiError;
use coupler::fsutil::working_directory_lock;
use coupler::params::{ParamValue, Parameters, Quantity};
use coupler::plugin::{
    FunctionPlugin, GenericPlugin, Plugin, PluginOptions, RunArgs, RunContext, RunRequest,
};
use coupler::process::OutputSink;
use coupler::results::{ExecInfo, ResultKind, ResultRecord};
use coupler::units::{TemperatureUnit, UnitSystem};
use coupler::WorkflowContext;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::integration::support::{cat_plugin, write_template};

#[test]
fn cat_plugin_end_to_end() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let template = write_template(tmp.path(), "x_template", "{{x}}");
    let mut plugin = GenericPlugin::new(&template, "cat").unwrap();

    let expected_id = ctx.database(None).unwrap().read().next_job_id();
    let params = Parameters::from_map([("x", 42)]);
    let record = ctx
        .run(&mut plugin, Some(&params), &RunRequest::default())
        .unwrap();

    assert_eq!(record.job_id(), Some(expected_id));
    assert_eq!(record.plugin(), "cat");
    assert_eq!(record.name(), "Workflow");
    assert_eq!(record.inputs(), &[PathBuf::from("input_rendered")]);
    assert_eq!(record.outputs(), &[PathBuf::from("cat_log.txt")]);
    assert_eq!(
        fs::read_to_string(record.base_path().join("cat_log.txt")).unwrap(),
        "42"
    );
    assert_eq!(record.stdout().unwrap(), "42");
    assert!(record.base_path().join(".result_info.json").is_file());

    let handle = ctx.database(None).unwrap();
    let db = handle.read();
    assert_eq!(db.len(), 1);
    assert_eq!(db.last().unwrap(), &record);
    assert_eq!(db.last().unwrap().parameters().get("x").unwrap(), &ParamValue::Int(42));
}

#[test]
fn job_ids_follow_insertion_order() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let records = crate::integration::support::populate(&ctx, tmp.path());
    let ids: Vec<_> = records.iter().map(ResultRecord::job_id).collect();
    assert_eq!(ids, vec![Some(0), Some(1), Some(2)]);

    let handle = ctx.database(None).unwrap();
    handle.write().remove(&records[1]).unwrap();
    assert!(!records[1].base_path().exists());

    let mut plugin = cat_plugin(tmp.path());
    let params = Parameters::from_map([("variable", 40)]);
    let record = ctx
        .run(&mut plugin, Some(&params), &RunRequest::named("var=40"))
        .unwrap();
    assert_eq!(record.job_id(), Some(3));
    assert_eq!(handle.read().len(), 3);
}

#[test]
fn repeated_names_get_distinct_directories() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let mut plugin = cat_plugin(tmp.path());
    let request = RunRequest::named("case");

    let first = ctx
        .run(&mut plugin, Some(&Parameters::from_map([("variable", 1)])), &request)
        .unwrap();
    let second = ctx
        .run(&mut plugin, Some(&Parameters::from_map([("variable", 2)])), &request)
        .unwrap();

    assert_eq!(first.base_path().file_name().unwrap(), "case");
    assert_eq!(second.base_path().file_name().unwrap(), "case_1");
    assert_eq!(first.stdout().unwrap(), "1");
    assert_eq!(second.stdout().unwrap(), "2");
}

/// Succeeds through `run`, then fails while harvesting
struct FailingHarvest {
    options: PluginOptions,
    seen_workdir: Arc<Mutex<Option<PathBuf>>>,
}

impl Plugin for FailingHarvest {
    fn plugin_name(&self) -> &str {
        "failing"
    }

    fn options(&self) -> &PluginOptions {
        &self.options
    }

    fn prerun(&mut self, _params: &Parameters, ctx: &RunContext) -> Result<(), ApiError> {
        *self.seen_workdir.lock() = Some(ctx.workdir().to_path_buf());
        fs::write(ctx.workdir().join("partial.out"), "half").unwrap();
        Ok(())
    }

    fn run(
        &mut self,
        _ctx: &RunContext,
        _args: &RunArgs,
        sink: &dyn OutputSink,
    ) -> Result<(), ApiError> {
        sink.stdout(b"running\n").unwrap();
        Ok(())
    }

    fn postrun(
        &mut self,
        _params: &Parameters,
        _ctx: &RunContext,
    ) -> Result<ResultRecord, ApiError> {
        Err(ApiError::HarvestError("no k-effective in output".to_string()))
    }
}

#[test]
fn postrun_failure_restores_working_directory() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let seen = Arc::new(Mutex::new(None));
    let mut plugin = FailingHarvest {
        options: PluginOptions::default(),
        seen_workdir: seen.clone(),
    };

    let before = std::env::current_dir().unwrap();
    let err = ctx
        .run(&mut plugin, None, &RunRequest::named("broken"))
        .unwrap_err();
    let after = std::env::current_dir().unwrap();

    assert!(matches!(err, ApiError::HarvestError(_)));
    assert_eq!(before, after);
    let workdir = seen.lock().clone().unwrap();
    assert!(!workdir.exists());

    let handle = ctx.database(None).unwrap();
    assert!(handle.read().is_empty());
    assert!(!handle.read().path().join("broken").exists());
}

#[test]
fn undefined_variable_fails_until_set() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let template = write_template(tmp.path(), "deck", "power = {{ power }}\n");
    let mut plugin = GenericPlugin::new(&template, "cat").unwrap();

    let mut params = Parameters::new();
    match ctx.run(&mut plugin, Some(&params), &RunRequest::default()) {
        Err(ApiError::UndefinedVariable { names, .. }) => {
            assert_eq!(names, vec!["power".to_string()])
        }
        other => panic!("expected undefined variable error, got {:?}", other.map(|r| r.name().to_string())),
    }
    assert!(ctx.database(None).unwrap().read().is_empty());

    params.insert("power", 3000);
    let record = ctx
        .run(&mut plugin, Some(&params), &RunRequest::default())
        .unwrap();
    assert_eq!(
        fs::read_to_string(record.base_path().join("input_rendered")).unwrap(),
        "power = 3000\n"
    );
}

#[cfg(unix)]
#[test]
fn nonzero_exit_policy() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let template = write_template(tmp.path(), "script", "echo partial; exit {{ code }}\n");
    let params = Parameters::from_map([("code", 3)]);

    let mut strict = GenericPlugin::new(&template, "sh").unwrap();
    let err = ctx
        .run(&mut strict, Some(&params), &RunRequest::default())
        .unwrap_err();
    assert!(matches!(err, ApiError::ExecutionError { .. }));

    let mut lenient = GenericPlugin::new(&template, "sh").unwrap();
    lenient.options_mut().fail_on_nonzero_exit = false;
    let record = ctx
        .run(&mut lenient, Some(&params), &RunRequest::default())
        .unwrap();
    assert_eq!(record.stdout().unwrap(), "partial\n");
}

#[cfg(unix)]
#[test]
fn staged_inputs_and_outputs_are_classified() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let extra = tmp.path().join("materials.xml");
    fs::write(&extra, "<materials/>").unwrap();
    let template = write_template(
        tmp.path(),
        "script",
        "cp materials.xml copy.xml\necho {{ n }} > out.txt\n",
    );

    let mut plugin = GenericPlugin::new(&template, "sh")
        .unwrap()
        .with_expected_outputs(["out.txt"]);
    plugin.options_mut().extra_inputs.push(extra.clone());

    let record = ctx
        .run(
            &mut plugin,
            Some(&Parameters::from_map([("n", 5)])),
            &RunRequest::named("staged"),
        )
        .unwrap();

    assert_eq!(
        record.inputs(),
        &[PathBuf::from("input_rendered"), PathBuf::from("materials.xml")]
    );
    assert_eq!(
        record.outputs(),
        &[
            PathBuf::from("copy.xml"),
            PathBuf::from("out.txt"),
            PathBuf::from("sh_log.txt"),
        ]
    );
    assert_eq!(
        fs::read_to_string(record.base_path().join("out.txt")).unwrap(),
        "5\n"
    );
    assert!(extra.is_file());
}

#[cfg(unix)]
#[test]
fn missing_expected_output_is_harvest_error() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let template = write_template(tmp.path(), "script", "true\n");
    let mut plugin = GenericPlugin::new(&template, "sh")
        .unwrap()
        .with_expected_outputs(["statepoint.h5"]);

    let err = ctx
        .run(&mut plugin, None, &RunRequest::default())
        .unwrap_err();
    match err {
        ApiError::HarvestError(message) => assert!(message.contains("statepoint.h5")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn quantities_are_converted_before_rendering() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let template = write_template(tmp.path(), "deck", "p = {{ p }}\n");
    let mut plugin = GenericPlugin::new(&template, "cat").unwrap().with_options(PluginOptions {
        unit_system: UnitSystem::Cgs,
        temperature_unit: TemperatureUnit::Kelvin,
        ..PluginOptions::default()
    });
    let params = Parameters::from_map([("p", Quantity::new(7.0, "MPa").unwrap())]);

    let record = ctx
        .run(&mut plugin, Some(&params), &RunRequest::default())
        .unwrap();
    assert_eq!(record.stdout().unwrap(), "p = 70000000.0\n");
    assert_eq!(record.parameters(), &params);
}

#[test]
fn function_plugin_records_returned_values() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let mut plugin = FunctionPlugin::new(|params, _dir| {
        let power = params.get("power")?.as_f64().unwrap_or_default();
        Ok(Parameters::from_map([("doubled", power * 2.0)]))
    })
    .with_name("doubler");

    let record = ctx
        .run(
            &mut plugin,
            Some(&Parameters::from_map([("power", 1.5)])),
            &RunRequest::named("calc"),
        )
        .unwrap();
    assert!(matches!(record.kind(), ResultKind::Function { .. }));
    assert_eq!(
        record.function_values().unwrap().get("doubled").unwrap(),
        &ParamValue::Float(3.0)
    );
}

/// Lists an output the run never wrote
struct PhantomOutput {
    options: PluginOptions,
}

impl Plugin for PhantomOutput {
    fn plugin_name(&self) -> &str {
        "phantom"
    }

    fn options(&self) -> &PluginOptions {
        &self.options
    }

    fn prerun(&mut self, _params: &Parameters, ctx: &RunContext) -> Result<(), ApiError> {
        fs::write(ctx.workdir().join("deck.i"), "deck").unwrap();
        Ok(())
    }

    fn run(
        &mut self,
        _ctx: &RunContext,
        _args: &RunArgs,
        _sink: &dyn OutputSink,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    fn postrun(&mut self, params: &Parameters, ctx: &RunContext) -> Result<ResultRecord, ApiError> {
        ResultRecord::new(
            ExecInfo::new("phantom", ctx.name(), ctx.start()),
            params.clone(),
            vec![PathBuf::from("deck.i")],
            vec![PathBuf::from("never_written.out")],
            ctx.workdir(),
            ResultKind::Generic,
        )
    }
}

#[test]
fn failed_relocation_discards_result_directory() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let mut plugin = PhantomOutput {
        options: PluginOptions::default(),
    };

    let before = std::env::current_dir().unwrap();
    let err = ctx
        .run(&mut plugin, None, &RunRequest::named("lost"))
        .unwrap_err();
    assert!(matches!(err, ApiError::RelocationError { .. }));
    assert_eq!(std::env::current_dir().unwrap(), before);

    let handle = ctx.database(None).unwrap();
    assert!(handle.read().is_empty());
    assert!(!handle.read().path().join("lost").exists());
}

#[test]
fn explicit_output_dir_must_be_single_name() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let mut plugin = FunctionPlugin::new(|_, _| Ok(Parameters::new()));

    let err = ctx
        .run(
            &mut plugin,
            None,
            &RunRequest::named("c").with_output_dir("study/case1"),
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidResult(_)));

    let handle = ctx.database(None).unwrap();
    assert!(handle.read().is_empty());
    assert!(!handle.read().path().join("study").exists());
}

#[test]
fn clashing_input_names_run_once() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let staged = TempDir::new().unwrap();
    let extra = staged.path().join("input_rendered");
    fs::write(&extra, "{{ x }}").unwrap();
    let template = write_template(tmp.path(), "deck", "{{ x }}");

    let mut plugin = GenericPlugin::new(&template, "cat")
        .unwrap()
        .with_extra_templates([&extra])
        .unwrap();
    let record = ctx
        .run(
            &mut plugin,
            Some(&Parameters::from_map([("x", 7)])),
            &RunRequest::named("clash"),
        )
        .unwrap();

    assert_eq!(record.inputs(), &[PathBuf::from("input_rendered")]);
    assert_eq!(record.stdout().unwrap(), "7");
}
