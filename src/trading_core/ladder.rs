//! Partial-exit ladder
//!
//! Stages: `Armed -> Tp1Hit -> Tp2Hit`. Profit is measured in multiples of the
//! IB range. At most one stage advances per bar, so TP2 can never fire on the
//! bar that carried price through TP1, however far it went.
//!
//! The final target (TP3) is the profit target attached at entry and is left
//! to the venue.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::StrategyConfig;
use super::intents::{Direction, OrderIntent, PositionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LadderStage {
    Armed,
    Tp1Hit,
    /// Terminal
    Tp2Hit,
}

impl std::fmt::Display for LadderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LadderStage::Armed => write!(f, "ARMED"),
            LadderStage::Tp1Hit => write!(f, "TP1"),
            LadderStage::Tp2Hit => write!(f, "TP2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderParams {
    pub tp1_multiplier: f64,
    pub tp1_close_percent: f64,
    pub tp2_multiplier: f64,
    pub tp2_close_percent: f64,
    pub move_to_break_even: bool,
}

impl From<&StrategyConfig> for LadderParams {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            tp1_multiplier: config.tp1_multiplier,
            tp1_close_percent: config.tp1_close_percent,
            tp2_multiplier: config.tp2_multiplier,
            tp2_close_percent: config.tp2_close_percent,
            move_to_break_even: config.move_to_break_even,
        }
    }
}

/// What one evaluation of the ladder produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LadderOutcome {
    pub intents: Vec<OrderIntent>,
    /// New working stop when the break-even move fired
    pub break_even_stop: Option<f64>,
}

/// Per-trade ladder, created once the entry is seen filled
#[derive(Debug, Clone, PartialEq)]
pub struct TpLadder {
    direction: Direction,
    entry_tag: String,
    initial_quantity: u32,
    stage: LadderStage,
    moved_to_break_even: bool,
}

impl TpLadder {
    pub fn new(direction: Direction, entry_tag: impl Into<String>, initial_quantity: u32) -> Self {
        Self {
            direction,
            entry_tag: entry_tag.into(),
            initial_quantity,
            stage: LadderStage::Armed,
            moved_to_break_even: false,
        }
    }

    pub fn stage(&self) -> LadderStage {
        self.stage
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn initial_quantity(&self) -> u32 {
        self.initial_quantity
    }

    pub fn moved_to_break_even(&self) -> bool {
        self.moved_to_break_even
    }

    /// Evaluate the ladder for one primary bar
    pub fn manage(
        &mut self,
        params: &LadderParams,
        position: &PositionState,
        price: f64,
        ib_width: f64,
    ) -> LadderOutcome {
        let mut outcome = LadderOutcome::default();

        if ib_width <= 0.0 {
            debug!("Ladder idle: IB range has no width");
            return outcome;
        }

        let held = position.quantity;
        let profit_multiple = self.direction.profit(position.average_price, price) / ib_width;

        match self.stage {
            LadderStage::Armed if profit_multiple >= params.tp1_multiplier => {
                let close = percent_of(self.initial_quantity, params.tp1_close_percent);
                if !self.closable(close, held, "TP1") {
                    return outcome;
                }

                outcome
                    .intents
                    .push(OrderIntent::exit(self.direction, Some(close), "TP1", &self.entry_tag));
                self.stage = LadderStage::Tp1Hit;
                info!(
                    "TP1 Hit ({}x IB): Closed {}% ({} contracts) at {:.2}",
                    params.tp1_multiplier, params.tp1_close_percent, close, price
                );

                if params.move_to_break_even && !self.moved_to_break_even {
                    let stop = position.average_price;
                    outcome.intents.push(OrderIntent::SetStopLoss {
                        price: stop,
                        entry_tag: self.entry_tag.clone(),
                    });
                    outcome.break_even_stop = Some(stop);
                    self.moved_to_break_even = true;
                    info!("Stop loss moved to break-even: {:.2}", stop);
                }
            }
            LadderStage::Tp1Hit if profit_multiple >= params.tp2_multiplier => {
                let close = percent_of(held, params.tp2_close_percent);
                if !self.closable(close, held, "TP2") {
                    return outcome;
                }

                outcome
                    .intents
                    .push(OrderIntent::exit(self.direction, Some(close), "TP2", &self.entry_tag));
                self.stage = LadderStage::Tp2Hit;
                info!(
                    "TP2 Hit ({}x IB): Closed {}% of remaining ({} contracts) at {:.2}",
                    params.tp2_multiplier, params.tp2_close_percent, close, price
                );
            }
            _ => {}
        }

        outcome
    }

    fn closable(&self, close: u32, held: u32, stage: &str) -> bool {
        if close == 0 || close > held {
            warn!(
                "{} skipped: computed close of {} contracts with {} held",
                stage, close, held
            );
            return false;
        }
        true
    }
}

/// floor(quantity * percent / 100)
fn percent_of(quantity: u32, percent: f64) -> u32 {
    (quantity as f64 * percent / 100.0).floor() as u32
}
