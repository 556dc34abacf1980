//! Percent trailing stop
//!
//! The working stop only ever moves in the trade's favour.

use tracing::debug;

use super::intents::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingStop {
    pub percent: f64,
}

impl TrailingStop {
    /// Candidate stop trailing `price` by the configured percentage
    pub fn candidate(&self, direction: Direction, price: f64) -> f64 {
        price - direction.sign() * price * self.percent / 100.0
    }

    /// New stop if the candidate is tighter than `current`
    pub fn ratchet(&self, direction: Direction, current: f64, price: f64) -> Option<f64> {
        let candidate = self.candidate(direction, price);
        let tighter = match direction {
            Direction::Long => candidate > current,
            Direction::Short => candidate < current,
        };
        if tighter {
            debug!("Trailing stop updated {:.2} -> {:.2}", current, candidate);
            Some(candidate)
        } else {
            None
        }
    }
}
