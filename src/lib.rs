//! Coupler: Template-Driven Workflow Orchestration
//!
//! Couples external simulation codes through templated input files. A typed
//! parameter store is rendered into solver inputs by a plugin, the solver runs
//! inside an isolated working directory, and the produced files are registered
//! as a result in a directory-backed results database.

pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod fsutil;
pub mod logging;
pub mod params;
pub mod plugin;
pub mod process;
pub mod results;
pub mod template;
pub mod tooling;
pub mod types;
pub mod units;

pub use context::WorkflowContext;
pub use database::{Database, DatabaseHandle, DatabaseRegistry, ResultFilter};
pub use error::{ApiError, StorageError};
pub use params::{ParamValue, Parameters, Quantity};
pub use plugin::{Engine, FunctionPlugin, GenericPlugin, Plugin, PluginOptions, RunArgs, RunRequest};
pub use results::{ResultKind, ResultRecord};
