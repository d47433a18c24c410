//! Tooling Layer
//!
//! Command-line front end over the results database.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
