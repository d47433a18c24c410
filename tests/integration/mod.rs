mod cli_commands;
mod database_persistence;
mod engine_lifecycle;
mod support;
