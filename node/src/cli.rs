//! # CLI Interface
//!
//! Defines the command-line argument structure for `synthex-node` using
//! `clap` derive. Supports three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use synthex_protocol::config::{DEFAULT_API_PORT, DEFAULT_METRICS_PORT};

use crate::logging::LogFormat;

/// File name of the node settings inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// SYNTHEX devnet node.
///
/// Hosts a single vault engine wired to in-memory reference collaborators,
/// serves a JSON API over it, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "synthex-node",
    about = "SYNTHEX devnet node",
    version,
    propagate_version = true
)]
pub struct SynthexNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the SYNTHEX node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Initialize a data directory with a default settings file.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node settings file (JSON).
    ///
    /// When omitted, the node looks for `settings.json` in the data directory
    /// and falls back to built-in defaults if there is none.
    #[arg(long, short = 'c', env = "SYNTHEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the node data directory.
    #[arg(long, short = 'd', env = "SYNTHEX_DATA_DIR", default_value = ".synthex")]
    pub data_dir: PathBuf,

    /// Port for the JSON API.
    #[arg(long, env = "SYNTHEX_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "SYNTHEX_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(
        long,
        env = "SYNTHEX_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value = "pretty"
    )]
    pub log_format: LogFormat,
}

impl RunArgs {
    /// The settings file this invocation should read.
    pub fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.data_dir.join(SETTINGS_FILE))
    }
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "SYNTHEX_DATA_DIR", default_value = ".synthex")]
    pub data_dir: PathBuf,

    /// Network label written into the settings.
    #[arg(long, default_value = "devnet")]
    pub network: String,

    /// Overwrite an existing settings file.
    #[arg(long)]
    pub force: bool,
}
