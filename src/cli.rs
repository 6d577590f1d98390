use clap::Parser;

use crate::app::{BuildNumber, BUILD_REFRESH_SECS, LOG_REFRESH_SECS};

#[derive(Parser, Debug)]
#[command(name = "blw", version, about = "Build Log Watcher for Blazar-style CI servers")]
pub struct Cli {
    /// Base URL of the CI API, e.g. https://ci.example.com/api
    #[arg(short = 'u', long)]
    pub base_url: String,

    /// Numeric id of the branch to watch
    #[arg(short, long)]
    pub branch_id: u64,

    /// Module name within the branch
    #[arg(short, long)]
    pub module: String,

    /// Build number, or "latest"
    #[arg(short = 'n', long, default_value = "latest")]
    pub build: BuildNumber,

    /// Log poll interval in seconds
    #[arg(long, default_value_t = LOG_REFRESH_SECS)]
    pub log_refresh: u64,

    /// Build poll interval in seconds
    #[arg(long, default_value_t = BUILD_REFRESH_SECS)]
    pub build_refresh: u64,

    /// Print the log from its beginning instead of tailing it
    #[arg(long)]
    pub from_start: bool,

    /// Disable desktop notifications
    #[arg(long)]
    pub no_notify: bool,

    /// Log diagnostics to stderr
    #[arg(short, long)]
    pub verbose: bool,
}
