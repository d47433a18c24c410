use std::fs;
use std::sync::Arc;

use coupler::database::{Database, DatabaseRegistry, ResultFilter};
use coupler::fsutil::working_directory_lock;
use coupler::params::{ParamValue, Parameters};
use coupler::plugin::{FunctionPlugin, RunRequest};
use coupler::WorkflowContext;
use tempfile::TempDir;

use crate::integration::support::populate;

#[test]
fn reopened_database_matches_session() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let records = populate(&ctx, tmp.path());

    let reopened = Database::open(ctx.default_path()).unwrap();
    assert_eq!(reopened.len(), 3);
    for (loaded, original) in reopened.iter().zip(&records) {
        assert_eq!(loaded.job_id(), original.job_id());
        assert_eq!(loaded.name(), original.name());
        assert_eq!(loaded.timestamp(), original.timestamp());
        assert_eq!(loaded.inputs(), original.inputs());
        assert_eq!(loaded.outputs(), original.outputs());
        assert_eq!(loaded.parameters(), original.parameters());
    }
    assert_eq!(
        reopened[1].parameters().get("variable").unwrap(),
        &ParamValue::Int(20)
    );
    assert_eq!(reopened[2].stdout().unwrap(), "30");
    assert_eq!(reopened.next_job_id(), 3);
}

#[test]
fn next_job_id_after_reload_follows_highest_remaining() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let records = populate(&ctx, tmp.path());

    // Within the session a removed id is never handed out again
    let handle = ctx.database(None).unwrap();
    handle.write().remove(&records[2]).unwrap();
    assert_eq!(handle.read().next_job_id(), 3);

    // A fresh open derives the counter from what is on disk
    let reopened = DatabaseRegistry::new()
        .get_or_create(ctx.default_path())
        .unwrap();
    assert_eq!(reopened.read().len(), 2);
    assert_eq!(reopened.read().next_job_id(), 2);
    assert_eq!(reopened.read().last_job_id(), Some(1));
}

#[test]
fn corrupt_index_files_are_skipped() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let records = populate(&ctx, tmp.path());

    fs::write(records[0].base_path().join(".result_info.json"), "{ not json").unwrap();
    fs::create_dir_all(ctx.default_path().join("stray")).unwrap();

    let reopened = Database::open(ctx.default_path()).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened[0].name(), "var=20");
}

#[test]
fn registry_identity_for_relative_and_absolute_paths() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(tmp.path()).unwrap();

    let registry = DatabaseRegistry::new();
    let relative = registry.get_or_create("results");
    let absolute = registry.get_or_create(tmp.path().join("results"));
    std::env::set_current_dir(original).unwrap();

    let (relative, absolute) = (relative.unwrap(), absolute.unwrap());
    assert!(Arc::ptr_eq(&relative, &absolute));
    assert_eq!(registry.len(), 1);
}

#[test]
fn query_and_clear() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let records = populate(&ctx, tmp.path());

    let handle = ctx.database(None).unwrap();
    {
        let db = handle.read();
        let by_name = db.query(&ResultFilter {
            name: Some("var=20".to_string()),
            ..Default::default()
        });
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].0, 1);
        assert_eq!(
            db.query(&ResultFilter {
                plugin: Some("cat".to_string()),
                ..Default::default()
            })
            .len(),
            3
        );
        let summary = db.summary();
        assert!(summary.contains("var=30"));
        assert!(summary.contains("Total: 3 results."));
    }

    handle.write().clear().unwrap();
    assert!(handle.read().is_empty());
    assert!(records.iter().all(|r| !r.base_path().exists()));
    assert!(Database::open(ctx.default_path()).unwrap().is_empty());
}

#[test]
fn explicit_output_dir_survives_reopen() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let mut plugin = FunctionPlugin::new(|_, dir| {
        fs::write(dir.join("power.csv"), "3000").unwrap();
        Ok(Parameters::new())
    });

    let record = ctx
        .run(
            &mut plugin,
            None,
            &RunRequest::named("c").with_output_dir("case1"),
        )
        .unwrap();
    assert_eq!(record.base_path().file_name().unwrap(), "case1");

    let reopened = Database::open(ctx.default_path()).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened[0].base_path(), record.base_path());
    assert!(reopened[0].base_path().join("power.csv").is_file());
}

#[test]
fn non_finite_parameters_survive_reopen() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(tmp.path().join("db")).unwrap();
    let mut plugin = FunctionPlugin::new(|_, _| {
        Ok(Parameters::from_map([("residual", f64::INFINITY)]))
    });
    let params = Parameters::from_map([("keff_guess", f64::NAN)]);

    ctx.run(&mut plugin, Some(&params), &RunRequest::named("nan"))
        .unwrap();
    assert_eq!(ctx.database(None).unwrap().read().len(), 1);

    let reopened = Database::open(ctx.default_path()).unwrap();
    assert_eq!(reopened.len(), 1);
    let loaded = &reopened[0];
    assert!(loaded
        .parameters()
        .get("keff_guess")
        .unwrap()
        .as_f64()
        .unwrap()
        .is_nan());
    assert_eq!(
        loaded.function_values().unwrap().get("residual").unwrap(),
        &ParamValue::Float(f64::INFINITY)
    );
}
