//! Recording fakes for the external collaborators.

use crate::connectors::traits::{Brokerage, IndicatorSource, OrderRequest, SignalSource};
use crate::error::{BrokerError, MarketDataError, SignalError};
use crate::types::{
    AccountInfo, IndicatorSnapshot, MarketSnapshot, Order, OrderStatus, Position, Signal,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use std::sync::Mutex;

fn unavailable() -> BrokerError {
    BrokerError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: "API error".to_string(),
    }
}

#[derive(Default)]
pub struct MockBrokerage {
    account: Option<AccountInfo>,
    position: Option<Position>,
    fail: bool,
    reject_orders: bool,
    account_calls: Mutex<usize>,
    position_queries: Mutex<Vec<String>>,
    orders: Mutex<Vec<OrderRequest>>,
}

impl MockBrokerage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, buying_power: Decimal) -> Self {
        self.account = Some(AccountInfo {
            id: "acct-1".to_string(),
            status: "ACTIVE".to_string(),
            currency: Some("USD".to_string()),
            cash: buying_power,
            equity: Decimal::from(100_000),
            buying_power,
        });
        self
    }

    pub fn with_position(mut self, symbol: &str, qty: Decimal) -> Self {
        self.position = Some(Position {
            symbol: symbol.to_string(),
            qty,
            avg_entry_price: Decimal::from(150),
            market_value: None,
        });
        self
    }

    /// Every call fails as if the brokerage were down.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Only order submission fails.
    pub fn rejecting_orders(mut self) -> Self {
        self.reject_orders = true;
        self
    }

    pub fn account_calls(&self) -> usize {
        *self.account_calls.lock().unwrap()
    }

    pub fn position_queries(&self) -> Vec<String> {
        self.position_queries.lock().unwrap().clone()
    }

    /// Every submitted request, including ones that then failed.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl Brokerage for MockBrokerage {
    async fn get_account(&self) -> Result<AccountInfo, BrokerError> {
        *self.account_calls.lock().unwrap() += 1;
        if self.fail {
            return Err(unavailable());
        }
        self.account.clone().ok_or_else(unavailable)
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError> {
        self.position_queries.lock().unwrap().push(symbol.to_string());
        if self.fail {
            return Err(unavailable());
        }
        Ok(self.position.clone())
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, BrokerError> {
        self.orders.lock().unwrap().push(request.clone());
        if self.fail || self.reject_orders {
            return Err(BrokerError::Status {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "Invalid order parameters.".to_string(),
            });
        }
        Ok(Order {
            id: format!("order-{}", self.orders.lock().unwrap().len()),
            client_order_id: Some(request.client_order_id.clone()),
            symbol: request.symbol.clone(),
            qty: Some(request.qty),
            side: request.side,
            order_type: request.order_type,
            time_in_force: request.time_in_force,
            status: OrderStatus::Accepted,
        })
    }
}

/// Serves a fixed snapshot, or fails when constructed with `failing`.
pub struct MockIndicatorSource {
    snapshot: Option<IndicatorSnapshot>,
    calls: Mutex<usize>,
}

impl MockIndicatorSource {
    pub fn new(snapshot: IndicatorSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            snapshot: None,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

pub const AS_OF_SECS: i64 = 1_700_000_000;

#[async_trait]
impl IndicatorSource for MockIndicatorSource {
    async fn fetch(&self, _symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
        *self.calls.lock().unwrap() += 1;
        match &self.snapshot {
            Some(indicators) => Ok(MarketSnapshot {
                indicators: indicators.clone(),
                as_of: Utc.timestamp_opt(AS_OF_SECS, 0).unwrap(),
            }),
            None => Err(MarketDataError::Indicator("no bars".to_string())),
        }
    }
}

pub struct MockSignalSource {
    response: Result<Signal, SignalError>,
    calls: Mutex<usize>,
}

impl MockSignalSource {
    pub fn new(response: Result<Signal, SignalError>) -> Self {
        Self {
            response,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SignalSource for MockSignalSource {
    async fn fetch_signal(&self, _indicators: &IndicatorSnapshot) -> Result<Signal, SignalError> {
        *self.calls.lock().unwrap() += 1;
        self.response.clone()
    }
}
