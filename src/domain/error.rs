//! Domain error types.

use chrono::{DateTime, Utc};

use crate::domain::risk::RejectionReason;

/// Top-level error type for cryptotrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol} ({timeframe})")]
    NoData { symbol: String, timeframe: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("price series out of order at index {index}: {current} does not follow {previous}")]
    UnorderedSeries {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("degenerate computation in {context}")]
    ComputationDegenerate { context: String },

    #[error("trade rejected by risk manager: {}", format_reasons(.reasons))]
    ValidationRejected { reasons: Vec<RejectionReason> },

    #[error("order execution failed for {symbol}: {reason}")]
    ExecutionFailed { symbol: String, reason: String },

    #[error("position {id} not found")]
    PositionNotFound { id: u64 },

    #[error("position {id} is already closed")]
    PositionClosed { id: u64 },

    #[error("trade ledger lock poisoned")]
    LedgerPoisoned,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_reasons(reasons: &[RejectionReason]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::DataSource { .. }
            | TraderError::Persistence { .. }
            | TraderError::UnorderedSeries { .. } => 3,
            TraderError::ValidationRejected { .. }
            | TraderError::ExecutionFailed { .. }
            | TraderError::PositionNotFound { .. }
            | TraderError::PositionClosed { .. }
            | TraderError::LedgerPoisoned
            | TraderError::ComputationDegenerate { .. } => 4,
            TraderError::NoData { .. } | TraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
