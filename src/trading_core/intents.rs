//! Order intents and venue feedback
//!
//! The strategy never touches venue state. It reads position and equity
//! snapshots through the feed traits and answers with fire-and-forget intents.

use serde::{Deserialize, Serialize};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Favourable price move from `from` to `to`, positive when in profit
    pub fn profit(&self, from: f64, to: f64) -> f64 {
        (to - from) * self.sign()
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "Long"),
            Direction::Short => write!(f, "Short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketPosition {
    Flat,
    Long,
    Short,
}

/// The venue's view of the current position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub side: MarketPosition,
    pub average_price: f64,
    pub quantity: u32,
}

impl PositionState {
    pub fn flat() -> Self {
        Self {
            side: MarketPosition::Flat,
            average_price: 0.0,
            quantity: 0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.side == MarketPosition::Flat || self.quantity == 0
    }

    pub fn direction(&self) -> Option<Direction> {
        if self.quantity == 0 {
            return None;
        }
        match self.side {
            MarketPosition::Flat => None,
            MarketPosition::Long => Some(Direction::Long),
            MarketPosition::Short => Some(Direction::Short),
        }
    }
}

impl Default for PositionState {
    fn default() -> Self {
        Self::flat()
    }
}

/// Instructions for the order venue
///
/// Stop and target intents apply to the entry named by `entry_tag`. An exit
/// with `quantity: None` closes whatever is held on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderIntent {
    EnterLong {
        quantity: u32,
        tag: String,
    },
    EnterShort {
        quantity: u32,
        tag: String,
    },
    SetStopLoss {
        price: f64,
        entry_tag: String,
    },
    SetProfitTarget {
        price: f64,
        entry_tag: String,
    },
    ExitLong {
        quantity: Option<u32>,
        exit_tag: String,
        entry_tag: Option<String>,
    },
    ExitShort {
        quantity: Option<u32>,
        exit_tag: String,
        entry_tag: Option<String>,
    },
}

impl OrderIntent {
    pub fn enter(direction: Direction, quantity: u32, tag: &str) -> Self {
        match direction {
            Direction::Long => OrderIntent::EnterLong {
                quantity,
                tag: tag.to_string(),
            },
            Direction::Short => OrderIntent::EnterShort {
                quantity,
                tag: tag.to_string(),
            },
        }
    }

    /// Partial or full exit tied to an entry
    pub fn exit(
        direction: Direction,
        quantity: Option<u32>,
        exit_tag: &str,
        entry_tag: &str,
    ) -> Self {
        let exit_tag = exit_tag.to_string();
        let entry_tag = Some(entry_tag.to_string());
        match direction {
            Direction::Long => OrderIntent::ExitLong {
                quantity,
                exit_tag,
                entry_tag,
            },
            Direction::Short => OrderIntent::ExitShort {
                quantity,
                exit_tag,
                entry_tag,
            },
        }
    }

    /// Close long and close short regardless of the actual side
    pub fn flatten_all(exit_tag: &str) -> [Self; 2] {
        [
            OrderIntent::ExitLong {
                quantity: None,
                exit_tag: exit_tag.to_string(),
                entry_tag: None,
            },
            OrderIntent::ExitShort {
                quantity: None,
                exit_tag: exit_tag.to_string(),
                entry_tag: None,
            },
        ]
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, OrderIntent::EnterLong { .. } | OrderIntent::EnterShort { .. })
    }
}

/// Account equity lookup, queried once per sizing decision
pub trait AccountFeed {
    fn equity(&self, currency: &str) -> Option<f64>;
}

/// Position snapshot, polled once per primary bar
pub trait PositionFeed {
    fn position(&self) -> PositionState;
}

/// Fixed snapshot of both feeds, handy for driving the strategy directly
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSnapshot {
    pub equity: Option<f64>,
    pub position: PositionState,
}

impl AccountFeed for FeedSnapshot {
    fn equity(&self, _currency: &str) -> Option<f64> {
        self.equity
    }
}

impl PositionFeed for FeedSnapshot {
    fn position(&self) -> PositionState {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_profit() {
        assert_eq!(Direction::Long.profit(100.0, 104.0), 4.0);
        assert_eq!(Direction::Short.profit(100.0, 104.0), -4.0);
    }

    #[test]
    fn test_flat_detection() {
        assert!(PositionState::flat().is_flat());
        let pos = PositionState {
            side: MarketPosition::Short,
            average_price: 100.0,
            quantity: 3,
        };
        assert!(!pos.is_flat());
        assert_eq!(pos.direction(), Some(Direction::Short));
    }

    #[test]
    fn test_flatten_all_covers_both_sides() {
        let [long, short] = OrderIntent::flatten_all("Session End");
        assert!(matches!(long, OrderIntent::ExitLong { quantity: None, .. }));
        assert!(matches!(short, OrderIntent::ExitShort { quantity: None, .. }));
    }
}
