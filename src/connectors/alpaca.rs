// src/connectors/alpaca.rs
use crate::config::BrokerConfig;
use crate::connectors::messages::{BarsResponse, BrokerErrorBody};
use crate::connectors::traits::{Brokerage, MarketDataClient, OrderRequest};
use crate::error::{BrokerError, MarketDataError};
use crate::types::{AccountInfo, Bar, Order, OrderType, Position, Side, TimeInForce};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

/// Alpaca trading + market data REST client.
pub struct AlpacaClient {
    api_key: String,
    secret_key: String,
    http_client: Client,
    base_rest_url: String,
    data_url: String,
}

impl AlpacaClient {
    pub fn new(config: &BrokerConfig) -> Result<Self, url::ParseError> {
        // Fail early on malformed endpoints instead of on the first order.
        Url::parse(&config.base_url)?;
        Url::parse(&config.data_url)?;

        Ok(Self {
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            http_client: Client::new(),
            base_rest_url: config.base_url.trim_end_matches('/').to_string(),
            data_url: config.data_url.trim_end_matches('/').to_string(),
        })
    }

    fn authorized(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
    }

    async fn send_request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T, BrokerError> {
        let url = format!("{}{}", self.base_rest_url, endpoint);
        let mut request = self.authorized(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let text = check_status(response).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

async fn check_status(response: Response) -> Result<String, BrokerError> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        return Ok(text);
    }
    let message = serde_json::from_str::<BrokerErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    Err(BrokerError::Status { status, message })
}

/// Position endpoints take the symbol without the pair separator.
fn position_symbol(symbol: &str) -> String {
    symbol.replace('/', "")
}

#[async_trait]
impl Brokerage for AlpacaClient {
    async fn get_account(&self) -> Result<AccountInfo, BrokerError> {
        self.send_request::<_, ()>(Method::GET, "/v2/account", None)
            .await
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError> {
        let endpoint = format!("/v2/positions/{}", position_symbol(symbol));
        match self
            .send_request::<Position, ()>(Method::GET, &endpoint, None)
            .await
        {
            Ok(position) => Ok(Some(position)),
            Err(BrokerError::Status { status, message }) if status == StatusCode::NOT_FOUND => {
                debug!("No open position for {}: {}", symbol, message);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, BrokerError> {
        #[derive(Serialize)]
        struct AlpacaOrderRequest<'a> {
            symbol: &'a str,
            qty: String,
            side: Side,
            #[serde(rename = "type")]
            order_type: OrderType,
            time_in_force: TimeInForce,
            client_order_id: &'a str,
        }

        let body = AlpacaOrderRequest {
            symbol: &request.symbol,
            qty: request.qty.to_string(),
            side: request.side,
            order_type: request.order_type,
            time_in_force: request.time_in_force,
            client_order_id: &request.client_order_id,
        };

        info!(
            "🚀 Sending Order: {:?} {} {} ({:?}, {:?})",
            request.side, request.qty, request.symbol, request.order_type, request.time_in_force
        );

        self.send_request(Method::POST, "/v2/orders", Some(&body))
            .await
    }
}

#[async_trait]
impl MarketDataClient for AlpacaClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let start = chrono::Utc::now() - chrono::Duration::days(1);
        let query = serde_urlencoded::to_string([
            ("symbols", symbol.to_string()),
            ("timeframe", timeframe.to_string()),
            ("limit", limit.to_string()),
            ("start", start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            ("sort", "desc".to_string()),
        ])?;
        let url = format!("{}/v1beta3/crypto/us/bars?{}", self.data_url, query);

        let response = self.authorized(Method::GET, &url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MarketDataError::Status {
                status,
                message: text,
            });
        }

        let parsed: BarsResponse = serde_json::from_str(&text)?;
        Ok(into_chronological(parsed, symbol))
    }
}

/// Bars are requested newest-first so `limit` keeps the latest ones; the
/// indicator pipeline wants them oldest-first.
fn into_chronological(response: BarsResponse, symbol: &str) -> Vec<Bar> {
    let mut bars = response.bars.get(symbol).cloned().unwrap_or_default();
    bars.sort_by_key(|bar| bar.timestamp);
    bars
}
