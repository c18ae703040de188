//! CLI module
//!
//! Command-line interface for running incremental syncs.
//!
//! # Commands
//!
//! - `run` - Sync resources and commit their watermarks
//! - `resources` - List registered resources
//! - `watermark` - Show the stored watermark of a resource
//! - `validate` - Check the settings file

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{build_engine, Runner};
