//! Execution module for simulated trading
//!
//! Turns the strategy's order intents into paper fills, tracking the
//! position, account balance and trade history the strategy reads back
//! through its feed traits.

mod order;
mod paper;
mod position;

pub use order::{Fill, FillReason, OrderSide};
pub use paper::{PaperVenue, PROFIT_TARGET_TAG, STOP_LOSS_TAG};
pub use position::{DailyPnL, PositionManager, TradeRecord};
