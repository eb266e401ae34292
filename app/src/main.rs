// In app/src/main.rs

use anyhow::Result;
use app_config::Settings;
use clap::{Args, Parser, Subcommand};
use core_types::Asset;
use engine::{EVENT_CHANNEL_SIZE, QuoteRefresher, SimulatorService};
use events::SimEvent;
use quote_source::QuoteSource;
use simulator::{ArbitrageSimulator, SimulatorConfig, to_decimal};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

use self::tracing_layer::{EventBroadcastLayer, LOG_CACHE_SIZE, LogCache, subscribe_with_replay};
mod tracing_layer;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A simulated cross-exchange crypto arbitrage trader.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the scripted arbitrage loop against simulated exchanges.
    Run(RunArgs),

    /// Fetches one snapshot from the configured quote source and prints it as JSON.
    Quotes {
        /// Seed for the random quote source.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Prints the resolved settings as TOML.
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Number of arbitrage attempts to make.
    #[arg(short = 'n', long, default_value_t = 10)]
    iterations: u32,

    /// Pause between attempts, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Asset to trade. Defaults to `simulator.default_asset`.
    #[arg(short, long)]
    asset: Option<String>,

    /// USD committed per attempt. Defaults to `simulator.investment_amount`.
    #[arg(long)]
    investment: Option<f64>,

    /// Minimum profit percentage. Defaults to `simulator.threshold_percent`.
    #[arg(long)]
    threshold: Option<f64>,

    /// Seed for price movements and the random quote source.
    #[arg(long)]
    seed: Option<u64>,

    /// Print every simulator event to stdout as a JSON line.
    #[arg(long)]
    events: bool,
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Parse first so `--help` works without a config directory.
    let cli = Cli::parse();

    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let settings = app_config::load_settings()?;

    // --- Event channel and Tracing Setup ---
    let (events_tx, _) = broadcast::channel::<SimEvent>(EVENT_CHANNEL_SIZE);
    let log_cache: LogCache = Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CACHE_SIZE)));
    let level = settings.app.log_level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    build_subscriber(level, events_tx.clone(), log_cache.clone()).init();

    tracing::info!(environment = %settings.app.environment, "Starting arbitrage simulator");

    match cli.command {
        Commands::Run(args) => {
            handle_run(&settings, args, events_tx, log_cache).await?;
        }
        Commands::Quotes { seed } => {
            handle_quotes(&settings, seed).await?;
        }
        Commands::Config => {
            println!("{}", settings.to_toml_string()?);
        }
    }

    tracing::info!("Arbitrage simulator has finished successfully.");

    Ok(())
}

/// Console output on stderr plus the event-channel layer, both filtered at `level`.
fn build_subscriber(
    level: tracing::Level,
    events_tx: broadcast::Sender<SimEvent>,
    log_cache: LogCache,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    let targets = Targets::new().with_default(level);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(targets.clone());
    let event_layer = EventBroadcastLayer::new(events_tx, log_cache).with_filter(targets);
    tracing_subscriber::registry().with(fmt_layer).with(event_layer)
}

// --- "Run" Subcommand Logic ---

/// Drives `execute_arbitrage` on a fixed cadence while quotes refresh in the background.
async fn handle_run(
    settings: &Settings,
    args: RunArgs,
    events_tx: broadcast::Sender<SimEvent>,
    log_cache: LogCache,
) -> Result<()> {
    let config = SimulatorConfig::from_settings(settings)?;
    let simulator = match args.seed {
        Some(seed) => ArbitrageSimulator::seeded(config, seed)?,
        None => ArbitrageSimulator::with_entropy(config)?,
    };
    let printer = args.events.then(|| {
        let (replay, rx) = subscribe_with_replay(&events_tx, &log_cache);
        let (stop_tx, stop_rx) = oneshot::channel();
        (stop_tx, tokio::spawn(print_events(replay, rx, stop_rx, std::io::stdout())))
    });
    let service = SimulatorService::new(simulator, events_tx);

    let source: Arc<dyn QuoteSource> = Arc::from(quote_source::from_settings(settings, args.seed)?);
    let refresher = QuoteRefresher::spawn(
        service.clone(),
        source,
        Duration::from_secs(settings.quote_source.refresh_interval_secs),
    );

    let asset = Asset::new(args.asset.unwrap_or_else(|| settings.simulator.default_asset.clone()));
    let investment = to_decimal(
        args.investment.unwrap_or(settings.simulator.investment_amount),
        "investment",
    )?;
    let threshold = to_decimal(
        args.threshold.unwrap_or(settings.simulator.threshold_percent),
        "threshold",
    )?;
    let pause = Duration::from_millis(args.interval_ms);

    tracing::info!(
        asset = %asset,
        investment = %investment,
        threshold = %threshold,
        iterations = args.iterations,
        "Starting arbitrage loop."
    );

    for iteration in 1..=args.iterations {
        match service.execute_arbitrage(investment, &asset, threshold).await {
            Ok(result) => tracing::info!(
                iteration,
                profit = %result.profit.round_dp(2),
                pct = %result.profit_percentage.round_dp(3),
                "Iteration traded."
            ),
            Err(engine::Error::Simulation(simulator::Error::NoOpportunityFound { .. })) => {
                tracing::info!(iteration, "No opportunity above threshold.");
            }
            Err(e) => tracing::warn!(iteration, error = %e, "Iteration failed."),
        }

        if iteration < args.iterations {
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupted; stopping early.");
                    break;
                }
            }
        }
    }

    refresher.shutdown().await;

    let stats = service.stats().await;
    if let Some((stop_tx, printer)) = printer {
        let _ = stop_tx.send(());
        printer.await?;
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Writes the replayed log lines, then each live event, as one JSON line apiece.
///
/// On `stop` it drains whatever is already queued before returning the writer.
async fn print_events<W: Write>(
    replay: Vec<SimEvent>,
    mut rx: broadcast::Receiver<SimEvent>,
    mut stop: oneshot::Receiver<()>,
    mut out: W,
) -> W {
    for event in &replay {
        write_event(&mut out, event);
    }

    loop {
        tokio::select! {
            biased;
            received = rx.recv() => match received {
                Ok(event) => write_event(&mut out, &event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer lagged behind.");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut stop => {
                loop {
                    match rx.try_recv() {
                        Ok(event) => write_event(&mut out, &event),
                        Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
                break;
            }
        }
    }

    out
}

fn write_event<W: Write>(out: &mut W, event: &SimEvent) {
    let written = serde_json::to_string(event)
        .map_err(anyhow::Error::from)
        .and_then(|line| writeln!(out, "{}", line).map_err(anyhow::Error::from));
    if let Err(e) = written {
        tracing::error!(error = %e, "Failed to write event.");
    }
}

// --- "Quotes" Subcommand Logic ---

async fn handle_quotes(settings: &Settings, seed: Option<u64>) -> Result<()> {
    let source = quote_source::from_settings(settings, seed)?;
    let snapshot = source.fetch().await?;
    tracing::info!(source = source.name(), assets = snapshot.len(), "Fetched quote snapshot.");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
