// src/config.rs

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::TimeInForce;

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub data_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Unset means the transport default applies.
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    pub symbol: String,
    /// Share of buying power committed to a new buy.
    pub allocation_fraction: Decimal,
    pub interval_secs: u64,
    pub qty_step: Decimal,
    pub time_in_force: TimeInForce,
}

impl TradingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DecisionConfig {
    pub min_change_threshold: Option<f64>,
    pub threshold_indicator: String,
    pub min_repeat_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndicatorConfig {
    pub timeframe: String,
    pub lookback_bars: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub cci_period: usize,
    pub stoch_k_period: usize,
    pub stoch_smooth_k: usize,
    pub stoch_d_period: usize,
    pub sma_periods: Vec<usize>,
    pub ema_periods: Vec<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub signal: SignalConfig,
    pub trading: TradingConfig,
    pub decision: DecisionConfig,
    pub indicators: IndicatorConfig,
    pub state_file: PathBuf,
    pub log: LogConfig,
}

impl AppConfig {
    /// Reads `Settings.toml` (optional), then `APP_*` variables, then the
    /// legacy flat variable names.
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Self::defaults(Config::builder())?
            .add_source(File::with_name("Settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("indicators.sma_periods")
                    .with_list_parse_key("indicators.ema_periods")
                    .try_parsing(true),
            )
            .set_override_option("signal.api_key", std::env::var("DEEPSEEK_API_KEY").ok())?
            .set_override_option("broker.api_key", std::env::var("ALPACA_API_KEY").ok())?
            .set_override_option("broker.secret_key", std::env::var("ALPACA_SECRET_KEY").ok())?
            .set_override_option("broker.base_url", std::env::var("APCA_API_BASE_URL").ok())?
            .set_override_option(
                "trading.allocation_fraction",
                std::env::var("TRADE_ALLOCATION_PERCENTAGE").ok(),
            )?
            .set_override_option(
                "trading.interval_secs",
                std::env::var("TRADE_INTERVAL_SECONDS").ok(),
            )?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("broker.api_key", "")?
            .set_default("broker.secret_key", "")?
            .set_default("broker.base_url", "https://paper-api.alpaca.markets")?
            .set_default("broker.data_url", "https://data.alpaca.markets")?
            .set_default("signal.api_key", "")?
            .set_default("signal.api_url", "https://api.deepseek.com/chat/completions")?
            .set_default("signal.model", "deepseek-chat")?
            .set_default("signal.temperature", 0.7)?
            .set_default("signal.max_tokens", 150)?
            .set_default("trading.symbol", "BTC/USD")?
            .set_default("trading.allocation_fraction", "0.6")?
            .set_default("trading.interval_secs", 300)?
            .set_default("trading.qty_step", "0.000000001")?
            .set_default("trading.time_in_force", "gtc")?
            .set_default("decision.threshold_indicator", "rsi_14")?
            .set_default("decision.min_repeat_delay_ms", 1000)?
            .set_default("indicators.timeframe", "1Min")?
            .set_default("indicators.lookback_bars", 300)?
            .set_default("indicators.rsi_period", 14)?
            .set_default("indicators.atr_period", 14)?
            .set_default("indicators.bb_period", 20)?
            .set_default("indicators.bb_std_dev", 2.0)?
            .set_default("indicators.macd_fast", 12)?
            .set_default("indicators.macd_slow", 26)?
            .set_default("indicators.macd_signal", 9)?
            .set_default("indicators.cci_period", 14)?
            .set_default("indicators.stoch_k_period", 14)?
            .set_default("indicators.stoch_smooth_k", 3)?
            .set_default("indicators.stoch_d_period", 3)?
            .set_default("indicators.sma_periods", vec![20, 50, 200])?
            .set_default("indicators.ema_periods", vec![20, 50, 200])?
            .set_default("state_file", "state.json")?
            .set_default("log.level", "info")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.trading.allocation_fraction;
        if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
            return Err(ConfigError::Message(format!(
                "trading.allocation_fraction must be in (0, 1], got {}",
                fraction
            )));
        }
        if self.trading.interval_secs == 0 {
            return Err(ConfigError::Message(
                "trading.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.trading.qty_step <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "trading.qty_step must be positive".to_string(),
            ));
        }
        if self.trading.symbol.trim().is_empty() {
            return Err(ConfigError::Message("trading.symbol is empty".to_string()));
        }
        if let Some(threshold) = self.decision.min_change_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ConfigError::Message(format!(
                    "decision.min_change_threshold must be a finite non-negative number, got {}",
                    threshold
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AppConfig {
        AppConfig::defaults(Config::builder())
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = base();
        assert_eq!(config.trading.allocation_fraction, Decimal::new(6, 1));
        assert_eq!(config.trading.interval(), Duration::from_secs(300));
        assert_eq!(config.trading.time_in_force, TimeInForce::Gtc);
        assert_eq!(config.decision.min_change_threshold, None);
        assert_eq!(config.decision.min_repeat_delay_ms, 1000);
        assert_eq!(config.indicators.sma_periods, vec![20, 50, 200]);
        assert_eq!(config.indicators.cci_period, 14);
        assert_eq!(config.indicators.stoch_k_period, 14);
        assert_eq!(config.indicators.stoch_d_period, 3);
        assert_eq!(config.state_file, PathBuf::from("state.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_allocation_outside_unit_interval() {
        let mut config = base();
        config.trading.allocation_fraction = Decimal::new(15, 1);
        assert!(config.validate().is_err());

        config.trading.allocation_fraction = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_interval_and_negative_threshold() {
        let mut config = base();
        config.trading.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = base();
        config.decision.min_change_threshold = Some(-1.0);
        assert!(config.validate().is_err());
    }
}
