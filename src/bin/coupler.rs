//! Coupler CLI Binary
//!
//! Command-line interface for inspecting coupler results databases.

use anyhow::Context;
use clap::Parser;
use coupler::logging::init_logging;
use coupler::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(&cli.project, cli.config.as_deref(), cli.database.as_deref())
        .context("Error initializing results database")?;
    init_logging(Some(&cli.logging_config(context.config())))
        .context("Error initializing logging")?;
    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output.trim_end_matches('\n'));
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
