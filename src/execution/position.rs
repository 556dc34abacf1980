//! Position management and P&L tracking

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trading_core::{Direction, MarketPosition, PositionState};

/// Closed (or partially closed) trade for the P&L history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub direction: Direction,
    pub entry_tag: String,
    pub exit_tag: String,
    /// Contracts closed by this exit
    pub quantity: u32,
    pub entry_price: f64,
    pub exit_price: f64,
    /// P&L in points across all contracts
    pub pnl_points: f64,
    pub pnl_dollars: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
}

/// Daily P&L summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyPnL {
    pub date: Option<NaiveDate>,
    /// Gross P&L in dollars
    pub gross_pnl: f64,
    pub trade_count: u32,
    pub wins: u32,
    pub losses: u32,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Max drawdown in dollars from the day's peak balance
    pub max_drawdown: f64,
    pub peak_balance: f64,
}

#[derive(Debug, Clone)]
struct OpenPosition {
    direction: Direction,
    quantity: u32,
    avg_entry_price: f64,
    entry_time: DateTime<Utc>,
    entry_tag: String,
}

/// Tracks the simulated position, balance and trade history
#[derive(Debug)]
pub struct PositionManager {
    open: Option<OpenPosition>,
    trade_history: Vec<TradeRecord>,
    daily_pnl: DailyPnL,
    running_balance: f64,
    starting_balance: f64,
    peak_balance: f64,
    max_drawdown: f64,
    tick_size: f64,
    /// Dollars per tick per contract
    point_value: f64,
}

impl PositionManager {
    pub fn new(starting_balance: f64, tick_size: f64, point_value: f64) -> Self {
        Self {
            open: None,
            trade_history: Vec::new(),
            daily_pnl: DailyPnL {
                peak_balance: starting_balance,
                ..Default::default()
            },
            running_balance: starting_balance,
            starting_balance,
            peak_balance: starting_balance,
            max_drawdown: 0.0,
            tick_size,
            point_value,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.open.is_none()
    }

    /// Position as the strategy sees it
    pub fn position_state(&self) -> PositionState {
        match &self.open {
            Some(p) => PositionState {
                side: match p.direction {
                    Direction::Long => MarketPosition::Long,
                    Direction::Short => MarketPosition::Short,
                },
                average_price: p.avg_entry_price,
                quantity: p.quantity,
            },
            None => PositionState::flat(),
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        self.open.as_ref().map(|p| p.direction)
    }

    pub fn entry_tag(&self) -> Option<&str> {
        self.open.as_ref().map(|p| p.entry_tag.as_str())
    }

    pub fn running_balance(&self) -> f64 {
        self.running_balance
    }

    pub fn starting_balance(&self) -> f64 {
        self.starting_balance
    }

    pub fn net_pnl(&self) -> f64 {
        self.running_balance - self.starting_balance
    }

    /// Largest peak-to-trough drop in realized balance
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    /// Record an entry fill, averaging into an existing same-side position
    pub fn record_entry_fill(
        &mut self,
        direction: Direction,
        quantity: u32,
        price: f64,
        time: DateTime<Utc>,
        tag: &str,
    ) {
        match &mut self.open {
            Some(p) if p.direction == direction => {
                let old_value = p.avg_entry_price * p.quantity as f64;
                let new_value = price * quantity as f64;
                p.quantity += quantity;
                p.avg_entry_price = (old_value + new_value) / p.quantity as f64;
            }
            _ => {
                self.open = Some(OpenPosition {
                    direction,
                    quantity,
                    avg_entry_price: price,
                    entry_time: time,
                    entry_tag: tag.to_string(),
                });
            }
        }
    }

    /// Close up to `quantity` contracts (all when `None`) and book the P&L
    pub fn record_exit_fill(
        &mut self,
        quantity: Option<u32>,
        price: f64,
        time: DateTime<Utc>,
        exit_tag: &str,
    ) -> Option<TradeRecord> {
        let open = self.open.as_mut()?;
        let closed = quantity.map_or(open.quantity, |q| q.min(open.quantity));
        if closed == 0 {
            return None;
        }

        let pnl_points = open.direction.profit(open.avg_entry_price, price) * closed as f64;
        let pnl_dollars = pnl_points / self.tick_size * self.point_value;

        let record = TradeRecord {
            id: Uuid::new_v4(),
            direction: open.direction,
            entry_tag: open.entry_tag.clone(),
            exit_tag: exit_tag.to_string(),
            quantity: closed,
            entry_price: open.avg_entry_price,
            exit_price: price,
            pnl_points,
            pnl_dollars,
            entry_time: open.entry_time,
            exit_time: time,
        };

        open.quantity -= closed;
        if open.quantity == 0 {
            self.open = None;
        }

        self.book(pnl_dollars);
        self.trade_history.push(record.clone());
        Some(record)
    }

    fn book(&mut self, pnl_dollars: f64) {
        self.running_balance += pnl_dollars;

        let day = &mut self.daily_pnl;
        day.gross_pnl += pnl_dollars;
        day.trade_count += 1;
        if pnl_dollars > 0.0 {
            day.wins += 1;
            day.largest_win = day.largest_win.max(pnl_dollars);
        } else {
            day.losses += 1;
            day.largest_loss = day.largest_loss.min(pnl_dollars);
        }
        day.peak_balance = day.peak_balance.max(self.running_balance);
        day.max_drawdown = day.max_drawdown.max(day.peak_balance - self.running_balance);

        self.peak_balance = self.peak_balance.max(self.running_balance);
        self.max_drawdown = self.max_drawdown.max(self.peak_balance - self.running_balance);
    }

    /// Start a new trading day's P&L bucket
    pub fn reset_daily(&mut self, date: NaiveDate) {
        self.daily_pnl = DailyPnL {
            date: Some(date),
            peak_balance: self.running_balance,
            ..Default::default()
        };
    }

    pub fn trade_history(&self) -> &[TradeRecord] {
        &self.trade_history
    }

    pub fn daily_summary(&self) -> &DailyPnL {
        &self.daily_pnl
    }

    /// Fraction of exits booked at a profit
    pub fn win_rate(&self) -> f64 {
        if self.trade_history.is_empty() {
            return 0.0;
        }
        let wins = self.trade_history.iter().filter(|t| t.pnl_dollars > 0.0).count();
        wins as f64 / self.trade_history.len() as f64
    }

    pub fn stats_summary(&self) -> String {
        format!(
            "Balance: ${:.2} | Day P&L: ${:.2} | Exits: {} | WR: {:.1}%",
            self.running_balance,
            self.daily_pnl.gross_pnl,
            self.trade_history.len(),
            self.win_rate() * 100.0
        )
    }
}
