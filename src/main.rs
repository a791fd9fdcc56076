use std::sync::Arc;

use anyhow::Context;
use bandbot::api::{BinanceClient, MarketData};
use bandbot::config::Settings;
use bandbot::execution::{ExecutionGateway, LiveGateway, SimulatedGateway};
use bandbot::models::ExecutionMode;
use bandbot::persistence::TradeLedger;
use bandbot::risk::PositionSizer;
use bandbot::scheduler::{Scheduler, SchedulerConfig};
use bandbot::strategy::BandReversionStrategy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("🚀 BandBot starting");

    let settings = Settings::load().context("failed to load settings")?;
    log_configuration(&settings);

    let ledger = TradeLedger::open(&settings.ledger_path)
        .with_context(|| format!("failed to open ledger {}", settings.ledger_path))?;

    let client = BinanceClient::new(settings.api_base_url.clone(), settings.request_timeout())?;
    let client = match (&settings.api_key, &settings.api_secret) {
        (Some(key), Some(secret)) => client.with_credentials(key.clone(), secret.clone()),
        _ => client,
    };

    let gateway = build_gateway(&settings, &ledger, &client)?;
    let market: Arc<dyn MarketData> = Arc::new(client);

    let mut scheduler = Scheduler::new(
        SchedulerConfig::from(&settings),
        market,
        gateway,
        ledger,
        Box::new(BandReversionStrategy::new(settings.strategy_config())),
        PositionSizer::new(settings.sizer_config()),
        settings.profit_sweep(),
    );

    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = scheduler.run() => {
            if let Err(e) = result {
                tracing::error!("💥 Trading loop stopped: {}", e);
                return Err(e.into());
            }
        }
    }

    tracing::info!("👋 BandBot stopped");
    Ok(())
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bandbot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_configuration(settings: &Settings) {
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Mode: {}", if settings.live { "LIVE" } else { "simulated" });
    tracing::info!("  Pair: {} ({}/{})", settings.symbol, settings.base_asset, settings.quote_asset);
    tracing::info!("  Timeframe: {} ({} candles)", settings.timeframe, settings.candle_limit);
    tracing::info!("  Poll interval: {}s (backoff {}s)", settings.poll_interval_secs, settings.backoff_secs);
    tracing::info!("  Risk per trade: {} {}", settings.risk_per_trade, settings.quote_asset);
    tracing::info!("  Stop distance: {}", settings.stop_loss_pct);
    match settings.profit_sweep() {
        Some(sweep) => tracing::info!("  Profit sweep: {} into {}", sweep.threshold(), sweep.symbol()),
        None => tracing::info!("  Profit sweep: disabled"),
    }
    tracing::info!("  Ledger: {}", settings.ledger_path);
}

/// Pick the execution backend, resuming simulated balances from the ledger
fn build_gateway(
    settings: &Settings,
    ledger: &TradeLedger,
    client: &BinanceClient,
) -> anyhow::Result<Box<dyn ExecutionGateway>> {
    if settings.live {
        tracing::warn!("💸 LIVE trading enabled: orders have real financial effect");
        return Ok(Box::new(LiveGateway::new(
            Arc::new(client.clone()),
            settings.tracked_assets(),
            settings.base_precision,
            settings.quote_precision,
            ledger.cost_basis(ExecutionMode::Live, &settings.symbol),
        )));
    }

    ledger
        .verify_balances(settings.initial_balances())
        .context("ledger balances do not reconcile")?;

    let gateway = match ledger.last_balances() {
        Some(balances) => {
            tracing::info!("Resuming simulated balances from ledger: {:?}", balances);
            SimulatedGateway::resume(
                balances,
                ledger.cost_basis(ExecutionMode::Simulated, &settings.symbol),
            )
        }
        None => SimulatedGateway::new(settings.initial_balances()),
    };

    Ok(Box::new(gateway))
}
