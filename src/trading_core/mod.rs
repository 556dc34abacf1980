//! Trading Core - IB breakout strategy logic
//!
//! This module contains the strategy components:
//! - Session calendar and IB window arithmetic
//! - IB range aggregation from the coarse source stream
//! - Opening candle classification
//! - Breakout detection with one-shot latches
//! - Position sizing, partial-exit ladder and trailing stop
//! - Day lifecycle controller

pub mod bars;
pub mod breakout;
pub mod config;
pub mod initial_balance;
pub mod intents;
pub mod ladder;
pub mod opening_candle;
pub mod session;
pub mod sizing;
pub mod strategy;
pub mod trailing;

// Re-export commonly used types
pub use bars::{Bar, BarStream, BarWindow};
pub use breakout::{BreakoutDetector, BreakoutLatches, Latch};
pub use config::StrategyConfig;
pub use initial_balance::{IbAggregator, IbRange, Reconciliation};
pub use intents::{
    AccountFeed, Direction, FeedSnapshot, MarketPosition, OrderIntent, PositionFeed, PositionState,
};
pub use ladder::{LadderParams, LadderStage, TpLadder};
pub use opening_candle::OpeningBias;
pub use session::{IbWindow, SessionCalendar};
pub use sizing::PositionSizer;
pub use strategy::{ActiveTrade, DayState, IbBreakoutStrategy, SESSION_END_TAG};
pub use trailing::TrailingStop;
