//! CLI module for bulkpost - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
