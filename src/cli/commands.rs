//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pipefy extraction tap CLI
#[derive(Parser, Debug)]
#[command(name = "tap-pipefy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test the API credentials
    Check,

    /// Discover available streams and write a catalog to stdout
    Discover,

    /// Extract records for the streams selected in a catalog
    Sync {
        /// Catalog file produced by discover, with selections applied
        #[arg(long)]
        catalog: PathBuf,

        /// State file for resuming a partially completed run
        #[arg(short, long)]
        state: Option<PathBuf>,
    },
}
