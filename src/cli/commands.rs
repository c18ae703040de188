//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental Shopify extractor
#[derive(Parser, Debug)]
#[command(name = "shopify-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short, long, global = true, default_value = "shopify-sync.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync resources incrementally
    Run {
        /// Resources to sync (comma-separated, empty = settings or all)
        #[arg(long)]
        resources: Option<String>,

        /// Override the start date for resources without a watermark
        #[arg(long)]
        start_date: Option<String>,

        /// Output destination (local path or cloud URL)
        /// Supports: /path, s3://bucket/path, r2://bucket/path, gs://bucket/path, az://container/path
        #[arg(short, long)]
        destination: Option<String>,
    },

    /// List registered resources
    Resources,

    /// Show the stored watermark of a resource
    Watermark {
        /// Resource name
        resource: String,
    },

    /// Validate the settings file
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
