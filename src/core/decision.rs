// src/core/decision.rs
use crate::config::DecisionConfig;
use crate::types::{IndicatorSnapshot, Signal};
use std::time::Duration;
use tracing::{debug, info};

/// Gate between a proposed signal and its execution.
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    min_change_threshold: Option<f64>,
    threshold_indicator: String,
    min_repeat_delay: Duration,
}

impl DecisionPolicy {
    pub fn new(
        min_change_threshold: Option<f64>,
        threshold_indicator: impl Into<String>,
        min_repeat_delay: Duration,
    ) -> Self {
        Self {
            min_change_threshold,
            threshold_indicator: threshold_indicator.into(),
            min_repeat_delay,
        }
    }

    pub fn from_config(config: &DecisionConfig) -> Self {
        Self::new(
            config.min_change_threshold,
            config.threshold_indicator.clone(),
            Duration::from_millis(config.min_repeat_delay_ms),
        )
    }

    /// Decides, then waits out the pacing delay whatever the answer was.
    pub async fn should_execute(
        &self,
        proposed: Signal,
        last_executed: Option<Signal>,
        current: Option<&IndicatorSnapshot>,
        last: Option<&IndicatorSnapshot>,
    ) -> bool {
        let approved = self.evaluate(proposed, last_executed, current, last);
        if !self.min_repeat_delay.is_zero() {
            tokio::time::sleep(self.min_repeat_delay).await;
        }
        approved
    }

    /// The gates without the delay.
    pub fn evaluate(
        &self,
        proposed: Signal,
        last_executed: Option<Signal>,
        current: Option<&IndicatorSnapshot>,
        last: Option<&IndicatorSnapshot>,
    ) -> bool {
        // Hold carries no order, so repeating it is harmless.
        if last_executed == Some(proposed) && proposed != Signal::Hold {
            info!("Duplicate {} signal suppressed", proposed);
            return false;
        }

        if let Some(threshold) = self.min_change_threshold {
            let key = self.threshold_indicator.as_str();
            match (
                current.and_then(|s| s.get(key)),
                last.and_then(|s| s.get(key)),
            ) {
                (Some(now), Some(before)) => {
                    let delta = (now - before).abs();
                    if delta < threshold {
                        info!(
                            "{} moved {:.4} (< {}); signal not acted on",
                            key, delta, threshold
                        );
                        return false;
                    }
                }
                _ => debug!("{} missing from indicator history; threshold gate skipped", key),
            }
        }

        true
    }
}

/// Free-function form of [`DecisionPolicy::should_execute`].
pub async fn should_execute(
    proposed: Signal,
    last_executed: Option<Signal>,
    current: Option<&IndicatorSnapshot>,
    last: Option<&IndicatorSnapshot>,
    min_change_threshold: Option<f64>,
    threshold_indicator: &str,
    min_repeat_delay: Duration,
) -> bool {
    DecisionPolicy::new(min_change_threshold, threshold_indicator, min_repeat_delay)
        .should_execute(proposed, last_executed, current, last)
        .await
}
