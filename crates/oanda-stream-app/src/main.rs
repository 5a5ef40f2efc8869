/*
[INPUT]:  CLI arguments, optional YAML file, OANDA_* environment, OS shutdown signals
[OUTPUT]: Pricing snapshot plus streamed ticks or prices and heartbeats on stdout
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use oanda_stream_app::{AppConfig, OutputMode};

#[derive(Parser, Debug)]
#[command(name = "oanda-stream-app", version, about = "OANDA v3 pricing stream demo")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Instruments to stream, overriding the configuration
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    instruments: Vec<String>,
    /// Print raw price messages instead of ticks
    #[arg(long = "raw-prices")]
    raw_prices: bool,
    #[arg(long = "rate-limit-ms", value_name = "MS")]
    rate_limit_ms: Option<u64>,
    #[arg(long = "reconnect-retries", value_name = "N")]
    reconnect_retries: Option<u32>,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = ?args.config_path,
        raw_prices = args.raw_prices,
        dry_run = args.dry_run,
        "starting oanda-stream-app"
    );

    let config = load_config(&args)?;
    info!(
        instruments = ?config.instruments,
        rate_limit_ms = config.rate_limit_ms,
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let mode = if args.raw_prices {
        OutputMode::RawPrices
    } else {
        OutputMode::Ticks
    };
    let end = oanda_stream_app::run(&config, mode, shutdown)
        .await
        .context("run pricing stream")?;
    info!(?end, "shutdown complete");

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(args: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config_path.as_deref()).context("load config")?;
    if !args.instruments.is_empty() {
        config.instruments = args.instruments.clone();
    }
    if let Some(rate_limit_ms) = args.rate_limit_ms {
        config.rate_limit_ms = rate_limit_ms;
    }
    if let Some(retries) = args.reconnect_retries {
        config.reconnect_retries = retries;
    }
    config.validate().context("validate config")?;
    Ok(config)
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
