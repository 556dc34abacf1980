//! Error types for the strategy core
//!
//! Configuration errors are fatal to starting a session. Feed errors are
//! fatal for the bar that triggered them. Sizing errors abort a single entry.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::trading_core::bars::BarStream;

pub type StrategyResult<T> = Result<T, StrategyError>;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("sizing error: {0}")]
    Sizing(#[from] SizingError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },
    #[error("session end {end} is not after session start {start}")]
    EmptySession { start: String, end: String },
    #[error("IB window ending at {ib_end} extends past session end {session_end}")]
    IbBeyondSession { ib_end: String, session_end: String },
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("{stream} bar at {current} is not after previous bar at {previous}")]
    OutOfOrder {
        stream: BarStream,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    #[error("{stream} bar at {timestamp} is malformed: {reason}")]
    Malformed {
        stream: BarStream,
        timestamp: DateTime<Utc>,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("stop distance must be positive, got {0}")]
    NonPositiveStopDistance(f64),
    #[error("account equity unavailable for {0}")]
    EquityUnavailable(String),
}
