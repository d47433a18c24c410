//! CLI Tooling
//!
//! Command-line access to a results database: list, locate, show and remove
//! stored results.

use crate::config::{ConfigLoader, CouplerConfig};
use crate::context::WorkflowContext;
use crate::database::{format_results_table, DatabaseHandle, ResultFilter};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::results::ResultRecord;
use clap::{Parser, Subcommand};
use owo_colors::{OwoColorize, Stream};
use std::path::{Path, PathBuf};
use tracing::info;

/// Coupler CLI - inspect and manage workflow results
#[derive(Parser)]
#[command(name = "coupler")]
#[command(about = "Inspect and manage results of coupled simulation workflows")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root (location of coupler.toml)
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    /// Results database directory (overrides configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable logging to stderr at the configured level (default: warnings only)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List results
    Results {
        /// Filter by job ID
        #[arg(long)]
        job_id: Option<u64>,
        /// Display the most recent job
        #[arg(long)]
        last_job: bool,
        /// Filter by plugin name
        #[arg(long)]
        plugin: Option<String>,
        /// Filter by run name
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the directory holding the files of one result
    Dir {
        /// Index from the `results` table
        index: usize,
    },
    /// Show the captured output of one result
    Stdout {
        /// Index from the `results` table
        index: usize,
    },
    /// Remove a result and all of its files
    Rm {
        /// Index from the `results` table
        index: Option<usize>,
        /// Remove every result
        #[arg(long)]
        all: bool,
    },
}

impl Cli {
    /// Logging settings after applying command-line overrides
    pub fn logging_config(&self, config: &CouplerConfig) -> LoggingConfig {
        let mut logging = config.logging.clone();
        if !self.verbose && self.log_level.is_none() {
            logging.level = "warn".to_string();
        }
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        logging
    }
}

/// Format a section heading; plain when stdout is not a terminal.
fn format_section_heading(title: &str) -> String {
    format!(
        "{}",
        title.if_supports_color(Stream::Stdout, |t| t.bold())
    )
}

fn no_result(index: usize, db: &Path) -> ApiError {
    ApiError::ResultNotFound(format!(
        "No result with index {} in database at {}",
        index,
        db.display()
    ))
}

/// Loaded configuration plus the database the command operates on
pub struct CliContext {
    config: CouplerConfig,
    workflow: WorkflowContext,
    database: DatabaseHandle,
}

impl CliContext {
    /// Create a new CLI context
    ///
    /// `database` overrides the configured default database.
    pub fn new(
        project_root: &Path,
        config_path: Option<&Path>,
        database: Option<&Path>,
    ) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(project_root)?,
        };
        let mut workflow = WorkflowContext::from_config(&config, project_root)?;
        if let Some(path) = database {
            workflow.set_default_path(path)?;
        }
        let database = workflow.database(None)?;
        Ok(Self {
            config,
            workflow,
            database,
        })
    }

    pub fn config(&self) -> &CouplerConfig {
        &self.config
    }

    pub fn workflow(&self) -> &WorkflowContext {
        &self.workflow
    }

    /// Run `command` and return the text to print
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Results {
                job_id,
                last_job,
                plugin,
                name,
            } => self.handle_results(*job_id, *last_job, plugin.clone(), name.clone()),
            Commands::Dir { index } => {
                self.with_record(*index, |r| Ok(r.base_path().display().to_string()))
            }
            Commands::Stdout { index } => self.with_record(*index, ResultRecord::stdout),
            Commands::Rm { index, all } => self.handle_rm(*index, *all),
        }
    }

    fn handle_results(
        &self,
        job_id: Option<u64>,
        last_job: bool,
        plugin: Option<String>,
        name: Option<String>,
    ) -> Result<String, ApiError> {
        let db = self.database.read();
        let mut filter = ResultFilter {
            job_id,
            plugin,
            name,
        };
        if last_job {
            if let Some(last) = db.last_job_id() {
                filter.job_id = Some(last);
            }
        }
        let rows = db.query(&filter);
        Ok(format!(
            "{}\n  Database: {}\n\n{}",
            format_section_heading("Results"),
            db.path().display(),
            format_results_table(rows)
        ))
    }

    fn with_record<F>(&self, index: usize, f: F) -> Result<String, ApiError>
    where
        F: FnOnce(&ResultRecord) -> Result<String, ApiError>,
    {
        let db = self.database.read();
        let record = db.get(index).ok_or_else(|| no_result(index, db.path()))?;
        f(record)
    }

    fn handle_rm(&self, index: Option<usize>, all: bool) -> Result<String, ApiError> {
        let mut db = self.database.write();
        if all {
            let count = db.len();
            db.clear()?;
            info!(count, "Removed all results");
            return Ok(format!("Removed {} results.", count));
        }
        let index = index.ok_or_else(|| {
            ApiError::ConfigError("Must either provide index argument or --all flag.".to_string())
        })?;
        if db.get(index).is_none() {
            return Err(no_result(index, db.path()));
        }
        let record = db.remove_at(index)?;
        Ok(format!(
            "Removed result {} ({})",
            index,
            record.base_path().display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results_filters() {
        let cli = Cli::try_parse_from([
            "coupler", "results", "--plugin", "cat", "--name", "var=20", "--job-id", "3",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Results {
                job_id: Some(3),
                last_job: false,
                plugin: Some("cat".to_string()),
                name: Some("var=20".to_string()),
            }
        );
    }

    #[test]
    fn test_database_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["coupler", "dir", "--database", "giraffe", "100"]).unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("giraffe")));
        assert_eq!(cli.command, Commands::Dir { index: 100 });
    }

    #[test]
    fn test_rm_forms() {
        let cli = Cli::try_parse_from(["coupler", "rm", "--all"]).unwrap();
        assert_eq!(cli.command, Commands::Rm { index: None, all: true });
        let cli = Cli::try_parse_from(["coupler", "rm", "2"]).unwrap();
        assert_eq!(cli.command, Commands::Rm { index: Some(2), all: false });
        assert!(Cli::try_parse_from(["coupler", "dir", "-1"]).is_err());
    }

    #[test]
    fn test_logging_overrides() {
        let config = CouplerConfig::default();
        let quiet = Cli::try_parse_from(["coupler", "results"]).unwrap();
        assert_eq!(quiet.logging_config(&config).level, "warn");

        let verbose = Cli::try_parse_from(["coupler", "--verbose", "results"]).unwrap();
        assert_eq!(verbose.logging_config(&config).level, "info");

        let explicit = Cli::try_parse_from([
            "coupler", "--log-level", "debug", "--log-format", "json", "results",
        ])
        .unwrap();
        let logging = explicit.logging_config(&config);
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, "json");
    }
}
