// src/core/executor.rs
use crate::connectors::traits::{Brokerage, OrderRequest};
use crate::types::{AccountInfo, Order, OrderType, Position, Side, TimeInForce};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Failure-tolerant wrapper around a [`Brokerage`]. Every operation logs and
/// returns `None` instead of an error; nothing is retried here.
pub struct TradeExecutor {
    brokerage: Arc<dyn Brokerage>,
    default_time_in_force: TimeInForce,
}

impl TradeExecutor {
    pub fn new(brokerage: Arc<dyn Brokerage>, default_time_in_force: TimeInForce) -> Self {
        Self {
            brokerage,
            default_time_in_force,
        }
    }

    pub async fn get_account_info(&self) -> Option<AccountInfo> {
        info!("Fetching account information...");
        match self.brokerage.get_account().await {
            Ok(account) => {
                info!(
                    "Account Status: {}, Equity: {}, Buying Power: {}, Cash: {}",
                    account.status, account.equity, account.buying_power, account.cash
                );
                Some(account)
            }
            Err(e) => {
                error!("Error getting account info: {}", e);
                None
            }
        }
    }

    /// `None` both when nothing is held and when the query failed.
    pub async fn get_position(&self, symbol: &str) -> Option<Position> {
        match self.brokerage.get_position(symbol).await {
            Ok(Some(position)) => {
                info!(
                    "Current position for {}: {} @ avg {}",
                    symbol, position.qty, position.avg_entry_price
                );
                Some(position)
            }
            Ok(None) => {
                info!("No position found for {}", symbol);
                None
            }
            Err(e) => {
                warn!("Position query for {} failed: {}", symbol, e);
                None
            }
        }
    }

    /// Market order with the configured time-in-force.
    pub async fn place_order(&self, symbol: &str, qty: Decimal, side: Side) -> Option<Order> {
        self.place_order_with(symbol, qty, side, OrderType::Market, self.default_time_in_force)
            .await
    }

    pub async fn place_order_with(
        &self,
        symbol: &str,
        qty: Decimal,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
    ) -> Option<Order> {
        if qty <= Decimal::ZERO {
            warn!("Refusing {:?} order for {} with non-positive quantity {}", side, symbol, qty);
            return None;
        }

        let request = OrderRequest {
            symbol: symbol.to_string(),
            qty,
            side,
            order_type,
            time_in_force,
            client_order_id: Uuid::new_v4().to_string(),
        };

        info!("Attempting to place {:?} order for {} of {}...", side, qty, symbol);
        match self.brokerage.submit_order(&request).await {
            Ok(order) => {
                info!(
                    "✅ Placed {:?} order for {} of {}. Order ID: {} ({:?})",
                    side, qty, symbol, order.id, order.status
                );
                Some(order)
            }
            Err(e) => {
                error!("⚠️ Error placing order for {}: {}", symbol, e);
                None
            }
        }
    }
}
