use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sync_latency_probe::{command::ProbeCommand, settings::Settings};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(term_width = 0)]
#[command(version = option_env!("BUILD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION")))]
#[command(
    about = "Measures confirmation latency of synchronously submitted transactions",
    long_about = None,
    after_help = r#"Configuration:
    1. Config file with -c option (TOML)
    2. Environment variables with PROBE__ prefix (e.g., PROBE__RPC__URL)
    3. .env file in the current directory
    The signing key is read from the variable named by probe.credential_env (default PK).

Examples:
    # One run of 10 transactions
    PK=0x... sync-latency-probe measure

    # Every 5 minutes, 20 transactions spaced 100ms apart
    sync-latency-probe measure --attempts 20 --pacing-ms 100 --schedule 5m

    # Summary of the last 24 runs
    sync-latency-probe report --window 24h"#
)]
struct ProbeApp {
    /// Path to the configuration file (TOML format)
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: ProbeCommand,
}

#[tokio::main]
async fn main() -> Result<()> {
    let app = ProbeApp::parse();
    let settings = Settings::load(app.config.as_deref())?;
    init_logging(&settings.log_level);
    debug!("{settings}");

    if let Some(addr) = settings.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    app.command.try_into_execute(settings).await
}

fn init_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
