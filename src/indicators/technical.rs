// src/indicators/technical.rs
use crate::config::IndicatorConfig;
use crate::connectors::traits::{IndicatorSource, MarketDataClient};
use crate::error::MarketDataError;
use crate::types::{Bar, IndicatorSnapshot, MarketSnapshot};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use ta::indicators::{
    AverageTrueRange, BollingerBands, CommodityChannelIndex, ExponentialMovingAverage,
    FastStochastic, MovingAverageConvergenceDivergence, OnBalanceVolume,
    RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::{DataItem, Next};
use tracing::debug;

/// Indicator source that derives its snapshot from recent bars.
pub struct TechnicalIndicators {
    client: Arc<dyn MarketDataClient>,
    config: IndicatorConfig,
}

impl TechnicalIndicators {
    pub fn new(client: Arc<dyn MarketDataClient>, config: IndicatorConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl IndicatorSource for TechnicalIndicators {
    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
        let bars = self
            .client
            .fetch_bars(symbol, &self.config.timeframe, self.config.lookback_bars)
            .await?;
        debug!("Fetched {} bars for {}", bars.len(), symbol);

        let indicators = compute_snapshot(&bars, &self.config)?;
        let as_of = bars.last().map(|bar| bar.timestamp).unwrap_or_else(Utc::now);
        Ok(MarketSnapshot { indicators, as_of })
    }
}

fn invalid(e: impl std::fmt::Debug) -> MarketDataError {
    MarketDataError::Indicator(format!("{:?}", e))
}

/// Runs every configured indicator over `bars` (oldest first) and keeps the
/// values of the final bar. Indicators whose period exceeds the available
/// history are left out.
pub fn compute_snapshot(
    bars: &[Bar],
    config: &IndicatorConfig,
) -> Result<IndicatorSnapshot, MarketDataError> {
    let mut snapshot = IndicatorSnapshot::new();
    let Some(last) = bars.last() else {
        return Ok(snapshot);
    };
    let warmed_up = |period: usize| period > 0 && bars.len() >= period;

    snapshot.insert(IndicatorSnapshot::CLOSE, last.close);
    snapshot.insert("volume", last.volume);

    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let items = bars
        .iter()
        .map(|bar| {
            DataItem::builder()
                .open(bar.open)
                .high(bar.high)
                .low(bar.low)
                .close(bar.close)
                .volume(bar.volume)
                .build()
                .map_err(invalid)
        })
        .collect::<Result<Vec<_>, _>>()?;

    // RSI needs one extra bar to form its first delta.
    if warmed_up(config.rsi_period + 1) {
        let mut rsi = RelativeStrengthIndex::new(config.rsi_period).map_err(invalid)?;
        let value = closes.iter().fold(f64::NAN, |_, c| rsi.next(*c));
        snapshot.insert(format!("rsi_{}", config.rsi_period), value);
    }

    if warmed_up(config.macd_slow + config.macd_signal) {
        let mut macd = MovingAverageConvergenceDivergence::new(
            config.macd_fast,
            config.macd_slow,
            config.macd_signal,
        )
        .map_err(invalid)?;
        if let Some(out) = closes.iter().map(|c| macd.next(*c)).last() {
            snapshot.insert("macd", out.macd);
            snapshot.insert("macd_signal", out.signal);
            snapshot.insert("macd_hist", out.histogram);
        }
    }

    if warmed_up(config.bb_period) {
        let mut bb = BollingerBands::new(config.bb_period, config.bb_std_dev).map_err(invalid)?;
        if let Some(out) = closes.iter().map(|c| bb.next(*c)).last() {
            snapshot.insert("bb_upper", out.upper);
            snapshot.insert("bb_middle", out.average);
            snapshot.insert("bb_lower", out.lower);
        }
    }

    if warmed_up(config.atr_period + 1) {
        let mut atr = AverageTrueRange::new(config.atr_period).map_err(invalid)?;
        let value = items.iter().fold(f64::NAN, |_, item| atr.next(item));
        snapshot.insert(format!("atr_{}", config.atr_period), value);
    }

    if warmed_up(config.cci_period) {
        let mut cci = CommodityChannelIndex::new(config.cci_period).map_err(invalid)?;
        let value = items.iter().fold(f64::NAN, |_, item| cci.next(item));
        snapshot.insert(format!("cci_{}", config.cci_period), value);
    }

    // %K is the raw stochastic smoothed by an SMA; %D is an SMA of %K.
    let stoch_bars =
        (config.stoch_k_period + config.stoch_smooth_k + config.stoch_d_period).saturating_sub(2);
    if warmed_up(stoch_bars) {
        let mut fast = FastStochastic::new(config.stoch_k_period).map_err(invalid)?;
        let mut smooth = SimpleMovingAverage::new(config.stoch_smooth_k).map_err(invalid)?;
        let mut signal = SimpleMovingAverage::new(config.stoch_d_period).map_err(invalid)?;
        let mut last = (f64::NAN, f64::NAN);
        for item in &items {
            let k = smooth.next(fast.next(item));
            last = (k, signal.next(k));
        }
        snapshot.insert("stoch_k", last.0);
        snapshot.insert("stoch_d", last.1);
    }

    let mut obv = OnBalanceVolume::new();
    let value = items.iter().fold(f64::NAN, |_, item| obv.next(item));
    snapshot.insert("obv", value);

    for &period in &config.sma_periods {
        if warmed_up(period) {
            let mut sma = SimpleMovingAverage::new(period).map_err(invalid)?;
            let value = closes.iter().fold(f64::NAN, |_, c| sma.next(*c));
            snapshot.insert(format!("sma_{}", period), value);
        }
    }

    for &period in &config.ema_periods {
        if warmed_up(period) {
            let mut ema = ExponentialMovingAverage::new(period).map_err(invalid)?;
            let value = closes.iter().fold(f64::NAN, |_, c| ema.next(*c));
            snapshot.insert(format!("ema_{}", period), value);
        }
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config() -> IndicatorConfig {
        IndicatorConfig {
            timeframe: "1Min".to_string(),
            lookback_bars: 300,
            rsi_period: 14,
            atr_period: 14,
            bb_period: 20,
            bb_std_dev: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            cci_period: 14,
            stoch_k_period: 14,
            stoch_smooth_k: 3,
            stoch_d_period: 3,
            sma_periods: vec![20, 50, 200],
            ema_periods: vec![20, 50, 200],
        }
    }

    fn bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1;
                Bar {
                    timestamp: start + Duration::minutes(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0 + i as f64,
                }
            })
            .collect()
    }

    #[test]
    fn empty_history_yields_empty_snapshot() {
        let snapshot = compute_snapshot(&[], &config()).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn full_history_yields_every_indicator() {
        let history = bars(250);
        let snapshot = compute_snapshot(&history, &config()).unwrap();

        assert_eq!(snapshot.close(), Some(history[249].close));
        for key in [
            "rsi_14", "macd", "macd_signal", "macd_hist", "bb_upper", "bb_middle", "bb_lower",
            "atr_14", "cci_14", "stoch_k", "stoch_d", "obv", "sma_20", "sma_50", "sma_200", "ema_20", "ema_50", "ema_200",
        ] {
            assert!(snapshot.get(key).is_some(), "missing {}", key);
        }

        let rsi = snapshot.get("rsi_14").unwrap();
        assert!((0.0..=100.0).contains(&rsi));
        assert!(snapshot.get("bb_upper").unwrap() >= snapshot.get("bb_lower").unwrap());
        for key in ["stoch_k", "stoch_d"] {
            let value = snapshot.get(key).unwrap();
            assert!((0.0..=100.0).contains(&value), "{} out of range: {}", key, value);
        }
    }

    #[test]
    fn stochastic_waits_for_both_smoothing_windows() {
        // 14 + 3 + 3 - 2 bars are needed before %D has a full window.
        let snapshot = compute_snapshot(&bars(17), &config()).unwrap();
        assert!(snapshot.get("cci_14").is_some());
        assert!(snapshot.get("stoch_k").is_none());

        let snapshot = compute_snapshot(&bars(18), &config()).unwrap();
        assert!(snapshot.get("stoch_k").is_some());
        assert!(snapshot.get("stoch_d").is_some());
    }

    #[test]
    fn short_history_omits_long_windows() {
        let snapshot = compute_snapshot(&bars(30), &config()).unwrap();
        assert!(snapshot.get("rsi_14").is_some());
        assert!(snapshot.get("sma_20").is_some());
        assert!(snapshot.get("sma_50").is_none());
        assert!(snapshot.get("ema_200").is_none());
        assert!(snapshot.get("macd").is_none());
        assert!(snapshot.get("cci_14").is_some());
        assert!(snapshot.get("stoch_d").is_some());
    }
}
