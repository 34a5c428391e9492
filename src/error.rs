// src/error.rs
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed signal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalErrorKind {
    NetworkError,
    HttpError,
    ParsingError,
    ValidationError,
    UnexpectedError,
}

impl SignalErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalErrorKind::NetworkError => "network_error",
            SignalErrorKind::HttpError => "http_error",
            SignalErrorKind::ParsingError => "parsing_error",
            SignalErrorKind::ValidationError => "validation_error",
            SignalErrorKind::UnexpectedError => "unexpected_error",
        }
    }
}

impl fmt::Display for SignalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error half of the signal source contract.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct SignalError {
    pub kind: SignalErrorKind,
    pub message: String,
    /// `type` reported by the upstream error envelope, when there was one.
    pub upstream_type: Option<String>,
}

impl SignalError {
    pub fn new(kind: SignalErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            upstream_type: None,
        }
    }

    pub fn with_upstream_type(mut self, upstream_type: impl Into<String>) -> Self {
        self.upstream_type = Some(upstream_type.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("brokerage returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("failed to decode brokerage response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("market data request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("market data endpoint returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("failed to decode market data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to build market data query: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),
    #[error("invalid indicator parameters: {0}")]
    Indicator(String),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}
