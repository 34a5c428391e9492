use crate::error::{BrokerError, MarketDataError, SignalError};
use crate::types::{
    AccountInfo, Bar, IndicatorSnapshot, MarketSnapshot, Order, OrderType, Position, Side,
    Signal, TimeInForce,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Raw OHLCV history for one symbol.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, MarketDataError>;
}

/// Produces the indicator snapshot for the current time step. An empty
/// snapshot means no data was available.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError>;
}

/// Returns exactly one of a signal or a classified error per call.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn fetch_signal(&self, indicators: &IndicatorSnapshot) -> Result<Signal, SignalError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: Decimal,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub client_order_id: String,
}

/// Brokerage REST surface. `get_position` yields `Ok(None)` when the
/// brokerage reports no open position.
#[async_trait]
pub trait Brokerage: Send + Sync {
    async fn get_account(&self) -> Result<AccountInfo, BrokerError>;

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError>;

    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, BrokerError>;
}
