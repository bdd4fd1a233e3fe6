//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Incrementally mirror the EN16931 code list catalog with release metadata.
///
/// Runs one synchronization cycle by default; `--schedule` keeps running
/// cycles at a fixed interval until interrupted.
#[derive(Parser, Debug)]
#[command(name = "codelist-sync")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file (created with defaults when missing)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Keep running cycles until interrupted
    #[arg(long, visible_alias = "daemon")]
    pub schedule: bool,

    /// Seconds to wait before the first scheduled cycle
    #[arg(long, default_value_t = 0, requires = "schedule")]
    pub initial_delay: u64,

    /// Seconds between scheduled cycles (defaults to checkIntervalSeconds)
    #[arg(long, requires = "schedule", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Start transfers without asking for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Override the download base directory
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Override the registry file path
    #[arg(long)]
    pub registry: Option<PathBuf>,
}

impl Args {
    /// Default log filter: quiet wins over verbose.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
