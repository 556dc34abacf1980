//! Breakout detection against the IB range
//!
//! Each direction may fire once per day. Long is evaluated first, so on a bar
//! that qualifies both ways only the long fires.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::bars::Bar;
use super::initial_balance::IbRange;
use super::intents::Direction;
use super::opening_candle::OpeningBias;

/// One-shot trigger; `Fired` is terminal until the next day's reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Latch {
    #[default]
    Armed,
    Fired,
}

impl Latch {
    pub fn is_fired(&self) -> bool {
        *self == Latch::Fired
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreakoutLatches {
    pub long: Latch,
    pub short: Latch,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakoutDetector {
    pub breakout_by_close: bool,
    pub use_opening_candle_filter: bool,
}

impl BreakoutDetector {
    fn long_condition(&self, bar: &Bar, range: &IbRange) -> bool {
        if self.breakout_by_close {
            bar.close > range.high
        } else {
            bar.high > range.high
        }
    }

    fn short_condition(&self, bar: &Bar, range: &IbRange) -> bool {
        if self.breakout_by_close {
            bar.close < range.low
        } else {
            bar.low < range.low
        }
    }

    /// Whether the filter lets `direction` through; an unset bias blocks both
    fn allowed(&self, direction: Direction, bias: Option<OpeningBias>) -> bool {
        if !self.use_opening_candle_filter {
            return true;
        }
        matches!(
            (direction, bias),
            (Direction::Long, Some(OpeningBias::Bullish))
                | (Direction::Short, Some(OpeningBias::Bearish))
        )
    }

    /// Evaluate one primary bar; the caller guarantees the position is flat
    ///
    /// Returns the direction that fired and latches it.
    pub fn check(
        &self,
        bar: &Bar,
        range: &IbRange,
        bias: Option<OpeningBias>,
        latches: &mut BreakoutLatches,
    ) -> Option<Direction> {
        if !latches.long.is_fired() && self.long_condition(bar, range) {
            if self.allowed(Direction::Long, bias) {
                latches.long = Latch::Fired;
                return Some(Direction::Long);
            }
            info!("Long breakout ignored - opening candle was {}", describe(bias));
        }

        if !latches.short.is_fired() && self.short_condition(bar, range) {
            if self.allowed(Direction::Short, bias) {
                latches.short = Latch::Fired;
                return Some(Direction::Short);
            }
            info!("Short breakout ignored - opening candle was {}", describe(bias));
        }

        None
    }
}

fn describe(bias: Option<OpeningBias>) -> String {
    bias.map_or_else(|| "not found".to_string(), |b| b.to_string().to_lowercase())
}
