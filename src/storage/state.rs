// src/storage/state.rs
use crate::error::StateError;
use crate::types::{IndicatorSnapshot, Signal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// The single persisted record. Every field is absent on a cold start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub last_executed_signal: Option<Signal>,
    pub last_indicators: Option<IndicatorSnapshot>,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub last_price: Option<Decimal>,
    /// Epoch seconds.
    pub last_updated: Option<i64>,
}

/// JSON file holding the [`ExecutionState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing or unreadable record is a cold start.
    pub async fn load(&self) -> ExecutionState {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("{} not found. Starting with a clean state.", self.path.display());
                return ExecutionState::default();
            }
            Err(e) => {
                error!("Failed to read {}: {}. Starting fresh.", self.path.display(), e);
                return ExecutionState::default();
            }
        };

        match serde_json::from_str::<ExecutionState>(&data) {
            Ok(state) => {
                info!(
                    "Restored state: last signal {:?}, updated {:?}",
                    state.last_executed_signal, state.last_updated
                );
                state
            }
            Err(e) => {
                error!("Error decoding {}: {}. Starting fresh.", self.path.display(), e);
                ExecutionState::default()
            }
        }
    }

    /// Replaces the whole record. The new contents are written to a sibling
    /// temp file and renamed over the old one, so readers see either the
    /// previous or the new record.
    pub async fn save(
        &self,
        signal: Signal,
        indicators: &IndicatorSnapshot,
        price: Option<Decimal>,
        updated_at: i64,
    ) -> Result<ExecutionState, StateError> {
        let state = ExecutionState {
            last_executed_signal: Some(signal),
            last_indicators: Some(indicators.clone()),
            last_price: price,
            last_updated: Some(updated_at),
        };
        let data = serde_json::to_string_pretty(&state)?;

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!("💾 Saved state to {}: last signal {}", self.path.display(), signal);
        Ok(state)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
