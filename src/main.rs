use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use calstore::storage::config::Config;

mod cli;
use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging();

    let config = match &cli.config {
        Some(path) => Config::load_or_create_at(path)?,
        None => Config::load_or_create()?,
    };

    if let Err(e) = cli::run(cli, config) {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn setup_logging() -> WorkerGuard {
    let log_dir = Config::config_dir();

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "calstore.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    tracing::info!("calstore started");
    guard
}
