//! Paper venue: simulated fills for replaying the strategy
//!
//! Market intents fill at the close of the bar that produced them. Working
//! stop and target orders are resolved against each new primary bar's range
//! before the strategy sees that bar; when both are touched the stop wins.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use super::order::{Fill, FillReason, OrderSide};
use super::position::{PositionManager, TradeRecord};
use crate::error::ConfigError;
use crate::trading_core::{
    AccountFeed, Bar, Direction, OrderIntent, PositionFeed, PositionState, SessionCalendar,
    StrategyConfig,
};

pub const STOP_LOSS_TAG: &str = "Stop loss";
pub const PROFIT_TARGET_TAG: &str = "Profit target";

pub struct PaperVenue {
    currency: String,
    calendar: SessionCalendar,
    positions: PositionManager,
    stop: Option<f64>,
    target: Option<f64>,
    fills: Vec<Fill>,
    current_date: Option<NaiveDate>,
}

impl PaperVenue {
    pub fn new(config: &StrategyConfig, starting_balance: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            currency: config.account_currency.clone(),
            calendar: SessionCalendar::from_config(config)?,
            positions: PositionManager::new(starting_balance, config.tick_size, config.point_value),
            stop: None,
            target: None,
            fills: Vec::new(),
            current_date: None,
        })
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn working_stop(&self) -> Option<f64> {
        self.stop
    }

    /// Resolve working orders against a new bar
    pub fn on_bar(&mut self, bar: &Bar) -> Option<TradeRecord> {
        let date = self.calendar.trading_date(bar.timestamp);
        if self.current_date != Some(date) {
            if let Some(previous) = self.current_date {
                let day = self.positions.daily_summary();
                info!(
                    "Day {} closed: P&L ${:.2} | {}W/{}L | DD ${:.2}",
                    previous, day.gross_pnl, day.wins, day.losses, day.max_drawdown
                );
                info!("{}", self.positions.stats_summary());
            }
            self.positions.reset_daily(date);
            self.current_date = Some(date);
        }

        let direction = self.positions.direction()?;

        let stop_hit = self.stop.filter(|&stop| match direction {
            Direction::Long => bar.low <= stop,
            Direction::Short => bar.high >= stop,
        });
        if let Some(stop) = stop_hit {
            // Gapping through the stop fills at the open
            let price = match direction {
                Direction::Long => bar.open.min(stop),
                Direction::Short => bar.open.max(stop),
            };
            return self.close(None, price, bar.timestamp, STOP_LOSS_TAG, FillReason::StopLoss);
        }

        let target_hit = self.target.filter(|&target| match direction {
            Direction::Long => bar.high >= target,
            Direction::Short => bar.low <= target,
        });
        if let Some(target) = target_hit {
            let price = match direction {
                Direction::Long => bar.open.max(target),
                Direction::Short => bar.open.min(target),
            };
            return self.close(
                None,
                price,
                bar.timestamp,
                PROFIT_TARGET_TAG,
                FillReason::ProfitTarget,
            );
        }

        None
    }

    /// Apply one intent at `bar`'s close
    pub fn submit(&mut self, intent: &OrderIntent, bar: &Bar) -> Option<TradeRecord> {
        match intent {
            OrderIntent::EnterLong { quantity, tag } => {
                self.enter(Direction::Long, *quantity, tag, bar)
            }
            OrderIntent::EnterShort { quantity, tag } => {
                self.enter(Direction::Short, *quantity, tag, bar)
            }
            OrderIntent::SetStopLoss { price, entry_tag } => {
                if self.applies_to(entry_tag) {
                    debug!("Stop for {} set to {:.2}", entry_tag, price);
                    self.stop = Some(*price);
                }
                None
            }
            OrderIntent::SetProfitTarget { price, entry_tag } => {
                if self.applies_to(entry_tag) {
                    debug!("Target for {} set to {:.2}", entry_tag, price);
                    self.target = Some(*price);
                }
                None
            }
            OrderIntent::ExitLong {
                quantity, exit_tag, ..
            } => self.exit(Direction::Long, *quantity, exit_tag, bar),
            OrderIntent::ExitShort {
                quantity, exit_tag, ..
            } => self.exit(Direction::Short, *quantity, exit_tag, bar),
        }
    }

    fn applies_to(&self, entry_tag: &str) -> bool {
        self.positions.entry_tag() == Some(entry_tag)
    }

    fn enter(
        &mut self,
        direction: Direction,
        quantity: u32,
        tag: &str,
        bar: &Bar,
    ) -> Option<TradeRecord> {
        // An opposite entry reverses, closing the current position first
        let reversed = match self.positions.direction() {
            Some(held) if held != direction => {
                self.close(None, bar.close, bar.timestamp, tag, FillReason::Market)
            }
            _ => None,
        };

        self.positions
            .record_entry_fill(direction, quantity, bar.close, bar.timestamp, tag);
        self.fills.push(Fill::new(
            bar.timestamp,
            OrderSide::opening(direction),
            quantity,
            bar.close,
            FillReason::Market,
            tag,
        ));
        info!(
            "FILL {} {} {} @ {:.2}",
            tag,
            OrderSide::opening(direction),
            quantity,
            bar.close
        );

        reversed
    }

    fn exit(
        &mut self,
        direction: Direction,
        quantity: Option<u32>,
        tag: &str,
        bar: &Bar,
    ) -> Option<TradeRecord> {
        if self.positions.direction() != Some(direction) {
            return None;
        }
        self.close(quantity, bar.close, bar.timestamp, tag, FillReason::Market)
    }

    fn close(
        &mut self,
        quantity: Option<u32>,
        price: f64,
        time: DateTime<Utc>,
        tag: &str,
        reason: FillReason,
    ) -> Option<TradeRecord> {
        let direction = self.positions.direction()?;
        let record = self.positions.record_exit_fill(quantity, price, time, tag)?;

        let side = OrderSide::opening(direction).opposite();
        self.fills
            .push(Fill::new(time, side, record.quantity, price, reason, tag));
        info!(
            "FILL {} {} {} @ {:.2} | P&L ${:.2}",
            tag, side, record.quantity, price, record.pnl_dollars
        );

        if self.positions.is_flat() {
            self.stop = None;
            self.target = None;
        }
        Some(record)
    }
}

impl AccountFeed for PaperVenue {
    fn equity(&self, currency: &str) -> Option<f64> {
        (currency == self.currency).then_some(self.positions.running_balance())
    }
}

impl PositionFeed for PaperVenue {
    fn position(&self) -> PositionState {
        self.positions.position_state()
    }
}
