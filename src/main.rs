use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use movistar_xmltv::{
    config::Config,
    ingestor::CycleScheduler,
    sources::{EpgFetcher, LocalExport, MovistarClient},
};

#[derive(Parser)]
#[command(name = "movistar-xmltv")]
#[command(version)]
#[command(about = "Daily Movistar+ EPG to XMLTV converter and Tvheadend playlist generator")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Re-convert the saved raw export instead of downloading it
    #[arg(long)]
    developer_mode: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("movistar_xmltv={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting movistar-xmltv v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if cli.developer_mode {
        config.developer_mode = true;
    }

    let fetcher: Arc<dyn EpgFetcher> = if config.developer_mode {
        info!(
            "Developer mode: converting {} without contacting the upstream",
            config.artifacts.raw_path.display()
        );
        Arc::new(LocalExport::new(config.artifacts.raw_path.clone()))
    } else {
        Arc::new(MovistarClient::new(
            config.upstream.url.clone(),
            config.upstream.connect_timeout,
        )?)
    };

    let mut scheduler = CycleScheduler::new(&config, fetcher)?;

    tokio::select! {
        result = scheduler.run() => {
            if let Err(e) = result {
                error!("Scheduler stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, exiting");
        }
    }

    Ok(())
}
