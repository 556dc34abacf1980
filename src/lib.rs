// Library crate - IB breakout strategy engine, paper venue and replay tools

pub mod error;
pub mod execution;
pub mod replay;
pub mod trading_core;

// Re-export commonly used types
pub use error::{ConfigError, FeedError, SizingError, StrategyError, StrategyResult};
pub use trading_core::{Bar, IbBreakoutStrategy, OrderIntent, StrategyConfig};
