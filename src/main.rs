use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use snapshot_debugger::cli::Args;
use snapshot_debugger::{web, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level when both are set.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    config.apply_args(&args);
    config.validate()?;

    let state = Arc::new(AppState::new(config)?);
    web::serve(state, !args.no_banner).await?;
    Ok(())
}
