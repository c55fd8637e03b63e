// src/cli.rs
//! Command-line options for the monitor binary. Every option can also come
//! from the environment (or `.env`).

use clap::Parser;
use std::path::PathBuf;

use crate::config::DEFAULT_LOOKBACK_DAYS;

/// Collect, score, deduplicate and categorize a week of NIL news.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file (TOML or JSON). Defaults to $NIL_CONFIG_PATH, then config/monitor.{toml,json}
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Lookback window in days, ending now
    #[arg(short, long, env = "NIL_LOOKBACK_DAYS", default_value_t = DEFAULT_LOOKBACK_DAYS,
          value_parser = clap::value_parser!(u32).range(1..=365))]
    pub days: u32,

    /// Directory for the dated article and run files
    #[arg(long, env = "NIL_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Read feeds from `<dir>/<source-slug>.xml` instead of the network
    #[arg(long)]
    pub fixture_dir: Option<PathBuf>,

    /// Write Prometheus text exposition to this file after the run
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "NIL_LOG_JSON")]
    pub log_json: bool,

    /// How many top stories to log at the end of the run
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Skip writing data files
    #[arg(long)]
    pub no_persist: bool,
}
