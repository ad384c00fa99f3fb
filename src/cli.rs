use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "snapshot-debugger")]
#[command(version)]
#[command(about = "Capture, replay, and turn HTTP request snapshots into test cases")]
pub struct Args {
    /// Path to a TOML config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Interface to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding one JSON file per snapshot (overrides config)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set (e.g. info, debug, snapshot_debugger=trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Suppress the colored startup banner
    #[arg(long)]
    pub no_banner: bool,
}
