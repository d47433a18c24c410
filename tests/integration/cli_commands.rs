use std::path::Path;

use coupler::error::ApiError;
use coupler::fsutil::working_directory_lock;
use coupler::tooling::cli::{CliContext, Commands};
use coupler::WorkflowContext;
use tempfile::TempDir;

use crate::integration::support::populate;

fn results(job_id: Option<u64>, last_job: bool, plugin: Option<&str>, name: Option<&str>) -> Commands {
    Commands::Results {
        job_id,
        last_job,
        plugin: plugin.map(str::to_string),
        name: name.map(str::to_string),
    }
}

fn row_count(output: &str) -> usize {
    output.lines().filter(|l| l.contains("var=")).count()
}

fn setup(tmp: &TempDir) -> (CliContext, Vec<coupler::ResultRecord>) {
    let db_path = tmp.path().join("db");
    let ctx = WorkflowContext::new(&db_path).unwrap();
    let records = populate(&ctx, tmp.path());
    let cli = CliContext::new(tmp.path(), None, Some(db_path.as_path())).unwrap();
    (cli, records)
}

#[test]
fn results_filters() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let (cli, _) = setup(&tmp);

    let full = cli.execute(&results(None, false, None, None)).unwrap();
    assert_eq!(row_count(&full), 3);
    assert!(full.contains("Total: 3 results."));

    let by_plugin = cli.execute(&results(None, false, Some("cat"), None)).unwrap();
    assert_eq!(by_plugin, full);

    let by_name = cli
        .execute(&results(None, false, None, Some("var=20")))
        .unwrap();
    assert_eq!(row_count(&by_name), 1);

    let by_job = cli.execute(&results(Some(0), false, None, None)).unwrap();
    assert_eq!(row_count(&by_job), 1);
    assert!(by_job.contains("var=10"));

    let last = cli.execute(&results(None, true, None, None)).unwrap();
    assert_eq!(row_count(&last), 1);
    assert!(last.contains("var=30"));

    let none = cli.execute(&results(None, false, Some("openmc"), None)).unwrap();
    assert!(none.contains("No results."));
}

#[test]
fn dir_and_stdout_by_index() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let (cli, records) = setup(&tmp);

    for (index, record) in records.iter().enumerate() {
        let dir = cli.execute(&Commands::Dir { index }).unwrap();
        assert_eq!(Path::new(&dir), record.base_path());
        let stdout = cli.execute(&Commands::Stdout { index }).unwrap();
        assert_eq!(stdout, record.stdout().unwrap());
    }

    let err = cli.execute(&Commands::Dir { index: 100 }).unwrap_err();
    assert!(matches!(err, ApiError::ResultNotFound(_)));
    assert!(err.to_string().contains("No result with index 100"));
    assert!(cli.execute(&Commands::Stdout { index: 100 }).is_err());
}

#[test]
fn rm_single_and_all() {
    let _lock = working_directory_lock();
    let tmp = TempDir::new().unwrap();
    let (cli, records) = setup(&tmp);

    cli.execute(&Commands::Rm {
        index: Some(1),
        all: false,
    })
    .unwrap();
    assert!(!records[1].base_path().exists());
    let remaining = cli.execute(&results(None, false, None, None)).unwrap();
    assert_eq!(row_count(&remaining), 2);

    assert!(matches!(
        cli.execute(&Commands::Rm {
            index: None,
            all: false
        }),
        Err(ApiError::ConfigError(_))
    ));
    assert!(cli
        .execute(&Commands::Rm {
            index: Some(9),
            all: false
        })
        .is_err());

    let out = cli
        .execute(&Commands::Rm {
            index: None,
            all: true,
        })
        .unwrap();
    assert_eq!(out, "Removed 2 results.");
    let empty = cli.execute(&results(None, false, None, None)).unwrap();
    assert!(empty.contains("No results."));
}
