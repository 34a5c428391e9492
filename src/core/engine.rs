// src/core/engine.rs
use crate::config::TradingConfig;
use crate::connectors::traits::{IndicatorSource, SignalSource};
use crate::core::decision::DecisionPolicy;
use crate::core::executor::TradeExecutor;
use crate::error::SignalError;
use crate::storage::StateStore;
use crate::types::{Order, Side, Signal};
use crate::utils::precision::buy_quantity;
use futures::FutureExt;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How one pass through the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Indicator source failed or returned nothing.
    NoData,
    SignalFailed(SignalError),
    Rejected(Signal),
    /// Approved buy abandoned because no price was available.
    PriceUnavailable(Signal),
    /// Approved. `order` is `None` when no order was needed or it failed.
    Executed {
        signal: Signal,
        order: Option<Order>,
        persisted: bool,
    },
}

enum Execution {
    Completed(Option<Order>),
    PriceUnavailable,
}

pub struct TradingEngine {
    symbol: String,
    allocation_fraction: Decimal,
    qty_step: Decimal,
    interval: Duration,
    indicator_source: Arc<dyn IndicatorSource>,
    signal_source: Arc<dyn SignalSource>,
    executor: TradeExecutor,
    policy: DecisionPolicy,
    state_store: StateStore,
}

impl TradingEngine {
    pub fn new(
        config: &TradingConfig,
        indicator_source: Arc<dyn IndicatorSource>,
        signal_source: Arc<dyn SignalSource>,
        executor: TradeExecutor,
        policy: DecisionPolicy,
        state_store: StateStore,
    ) -> Self {
        Self {
            symbol: config.symbol.clone(),
            allocation_fraction: config.allocation_fraction,
            qty_step: config.qty_step,
            interval: config.interval(),
            indicator_source,
            signal_source,
            executor,
            policy,
            state_store,
        }
    }

    /// Runs until `shutdown` turns true. Shutdown is only honoured between
    /// iterations so an in-flight order is never abandoned.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Engine starting for {} (interval {:?})", self.symbol, self.interval);
        self.executor.get_account_info().await;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match AssertUnwindSafe(self.run_iteration()).catch_unwind().await {
                Ok(outcome) => debug!("Iteration finished: {:?}", outcome),
                Err(panic) => error!(
                    "An error occurred in the main loop: {}",
                    panic_message(panic.as_ref())
                ),
            }

            info!(
                "--- Waiting for the next {} seconds interval ---",
                self.interval.as_secs()
            );
            if self.sleep_or_shutdown(&mut shutdown).await {
                break;
            }
        }

        info!("Engine stopped.");
    }

    /// Returns true when shutdown was requested during the sleep.
    async fn sleep_or_shutdown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(self.interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can ask us to stop any more.
                        (&mut sleep).await;
                        return false;
                    }
                    if *shutdown.borrow() {
                        return true;
                    }
                }
            }
        }
    }

    /// One load → fetch → decide → execute → persist pass.
    pub async fn run_iteration(&self) -> IterationOutcome {
        let state = self.state_store.load().await;

        info!("--- Fetching market data for {} ---", self.symbol);
        let snapshot = match self.indicator_source.fetch(&self.symbol).await {
            Ok(snapshot) if !snapshot.indicators.is_empty() => snapshot,
            Ok(_) => {
                warn!("No market data fetched for {}. Skipping this interval.", self.symbol);
                return IterationOutcome::NoData;
            }
            Err(e) => {
                warn!("Market data for {} unavailable: {}. Skipping this interval.", self.symbol, e);
                return IterationOutcome::NoData;
            }
        };
        for (name, value) in snapshot.indicators.iter() {
            debug!("  {}: {}", name, value);
        }

        info!("--- Generating trading signal ---");
        let proposed = match self.signal_source.fetch_signal(&snapshot.indicators).await {
            Ok(signal) => signal,
            Err(e) => {
                error!("Error generating signal: {}", e);
                return IterationOutcome::SignalFailed(e);
            }
        };
        info!("Proposed Trading Signal: {}", proposed.as_str().to_uppercase());

        let approved = self
            .policy
            .should_execute(
                proposed,
                state.last_executed_signal,
                Some(&snapshot.indicators),
                state.last_indicators.as_ref(),
            )
            .await;
        if !approved {
            info!("Trade not approved. Skipping execution.");
            return IterationOutcome::Rejected(proposed);
        }

        info!("Trade approved. Proceeding to execution.");
        let price = snapshot.indicators.close().and_then(Decimal::from_f64);
        let order = match self.execute(proposed, price).await {
            Execution::Completed(order) => order,
            Execution::PriceUnavailable => return IterationOutcome::PriceUnavailable(proposed),
        };

        // Approval, not the fill, is what gets recorded.
        let persisted = match self
            .state_store
            .save(proposed, &snapshot.indicators, price, snapshot.as_of.timestamp())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to save state after {} execution: {}", proposed, e);
                false
            }
        };

        IterationOutcome::Executed {
            signal: proposed,
            order,
            persisted,
        }
    }

    async fn execute(&self, signal: Signal, price: Option<Decimal>) -> Execution {
        match signal {
            Signal::Hold => {
                info!("Signal is HOLD. No trade executed.");
                Execution::Completed(None)
            }
            Signal::Buy => {
                if let Some(position) = self.executor.get_position(&self.symbol).await {
                    info!("Position already open ({}). No trade executed.", position.qty);
                    return Execution::Completed(None);
                }
                let Some(account) = self.executor.get_account_info().await else {
                    error!("Could not retrieve account info to determine buying power.");
                    return Execution::Completed(None);
                };
                let Some(price) = price else {
                    error!("Current price unavailable. Skipping trade for this interval.");
                    return Execution::PriceUnavailable;
                };

                match buy_quantity(account.buying_power, self.allocation_fraction, price, self.qty_step) {
                    Some(qty) => {
                        Execution::Completed(self.executor.place_order(&self.symbol, qty, Side::Buy).await)
                    }
                    None => {
                        warn!(
                            "Calculated trade quantity is not positive (buying power {}, price {}). Not placing order.",
                            account.buying_power, price
                        );
                        Execution::Completed(None)
                    }
                }
            }
            Signal::Sell => match self.executor.get_position(&self.symbol).await {
                Some(position) if position.qty > Decimal::ZERO => Execution::Completed(
                    self.executor
                        .place_order(&self.symbol, position.qty, Side::Sell)
                        .await,
                ),
                Some(position) => {
                    warn!("Position quantity {} is not sellable. No trade executed.", position.qty);
                    Execution::Completed(None)
                }
                None => {
                    info!("No position to sell. No trade executed.");
                    Execution::Completed(None)
                }
            },
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
