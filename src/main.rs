// src/main.rs
use anyhow::Context;
use dotenvy::dotenv;
use signal_trader::config::AppConfig;
use signal_trader::connectors::alpaca::AlpacaClient;
use signal_trader::connectors::deepseek::DeepSeekClient;
use signal_trader::core::{DecisionPolicy, TradeExecutor, TradingEngine};
use signal_trader::indicators::TechnicalIndicators;
use signal_trader::storage::StateStore;
use signal_trader::utils::logging;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // 1. Load Configuration
    let config = AppConfig::new().context("invalid configuration")?;
    let _log_guard = logging::init(&config.log)?;

    info!("========================================");
    info!("       SIGNAL TRADER - v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Target:   {}", config.trading.symbol);
    info!("Broker:   {}", config.broker.base_url);
    info!("Interval: {}s", config.trading.interval_secs);
    match config.decision.min_change_threshold {
        Some(t) => info!("Gate:     {} must move >= {}", config.decision.threshold_indicator, t),
        None => info!("Gate:     repeat suppression only"),
    }
    if config.broker.api_key.is_empty() || config.signal.api_key.is_empty() {
        warn!("API credentials are missing; external calls will be rejected");
    }

    // 2. Initialize Components
    let alpaca = Arc::new(AlpacaClient::new(&config.broker).context("invalid broker URL")?);
    let signal_source =
        Arc::new(DeepSeekClient::new(&config.signal).context("failed to build signal client")?);
    let indicator_source = Arc::new(TechnicalIndicators::new(
        alpaca.clone(),
        config.indicators.clone(),
    ));
    let executor = TradeExecutor::new(alpaca, config.trading.time_in_force);

    let engine = TradingEngine::new(
        &config.trading,
        indicator_source,
        signal_source,
        executor,
        DecisionPolicy::from_config(&config.decision),
        StateStore::new(config.state_file.clone()),
    );

    // 3. Graceful shutdown on Ctrl+C, honoured between iterations
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested; finishing current iteration...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    // 4. Run Engine
    engine.run(shutdown_rx).await;

    Ok(())
}
