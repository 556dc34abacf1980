//! Order sides and fill records for the paper venue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trading_core::Direction;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Side that opens a position in `direction`
    pub fn opening(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::Buy,
            Direction::Short => Self::Sell,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Why a fill happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillReason {
    /// Market order from an intent, filled at the bar close
    Market,
    StopLoss,
    ProfitTarget,
}

impl std::fmt::Display for FillReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Market => write!(f, "MARKET"),
            Self::StopLoss => write!(f, "STOP"),
            Self::ProfitTarget => write!(f, "TARGET"),
        }
    }
}

/// A single simulated execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Client-side order ID
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub side: OrderSide,
    pub quantity: u32,
    pub price: f64,
    pub reason: FillReason,
    /// Entry or exit signal name
    pub tag: String,
}

impl Fill {
    pub fn new(
        time: DateTime<Utc>,
        side: OrderSide,
        quantity: u32,
        price: f64,
        reason: FillReason,
        tag: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
            side,
            quantity,
            price,
            reason,
            tag: tag.to_string(),
        }
    }
}
