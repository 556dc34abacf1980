//! Day lifecycle controller for the IB breakout strategy
//!
//! Broker-agnostic and synchronous. Callers feed both bar streams in
//! timestamp order and route the returned intents to a venue:
//!
//! - `on_ib_source_bar` only records the bar for IB aggregation
//! - `on_primary_bar` runs the full cycle: day rollover, session flatten,
//!   IB formation, breakout check, ladder and trailing-stop management

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use super::bars::{lookback_for, Bar, BarStream, BarWindow};
use super::breakout::{BreakoutDetector, BreakoutLatches};
use super::config::StrategyConfig;
use super::initial_balance::{IbAggregator, IbRange, Reconciliation};
use super::intents::{AccountFeed, Direction, OrderIntent, PositionFeed, PositionState};
use super::ladder::{LadderParams, LadderStage, TpLadder};
use super::opening_candle::{OpeningBias, OpeningCandle};
use super::session::{IbWindow, SessionCalendar};
use super::sizing::PositionSizer;
use super::trailing::TrailingStop;
use crate::error::{SizingError, StrategyResult};

/// Exit tag used by the session-end flatten
pub const SESSION_END_TAG: &str = "Session End";

/// Primary bars retained for ordering checks
const PRIMARY_HISTORY: usize = 10;

/// Per-trading-day state, rebuilt whenever the primary stream changes date
#[derive(Debug, Clone, PartialEq)]
pub struct DayState {
    pub date: NaiveDate,
    pub ib_window: IbWindow,
    /// `None` until formed; never a zero-bar placeholder
    pub ib: Option<IbRange>,
    pub latches: BreakoutLatches,
    pub opening_candle: OpeningCandle,
    pub opening_bias: Option<OpeningBias>,
    pub opening_candle_checked: bool,
    pub trade_taken: bool,
    lag_reported: bool,
    gap_reported: bool,
}

impl DayState {
    fn new(date: NaiveDate, ib_window: IbWindow) -> Self {
        Self {
            date,
            ib_window,
            ib: None,
            latches: BreakoutLatches::default(),
            opening_candle: OpeningCandle::default(),
            opening_bias: None,
            opening_candle_checked: false,
            trade_taken: false,
            lag_reported: false,
            gap_reported: false,
        }
    }

    pub fn ib_formed(&self) -> bool {
        self.ib.is_some()
    }
}

/// The entry this strategy placed today and its management state
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTrade {
    pub direction: Direction,
    pub entry_tag: String,
    pub entry_price: f64,
    pub quantity: u32,
    /// Working protective stop as last instructed
    pub stop: f64,
    pub target: f64,
    pub filled: bool,
    pub ladder: Option<TpLadder>,
}

pub struct IbBreakoutStrategy {
    config: StrategyConfig,
    calendar: SessionCalendar,
    aggregator: IbAggregator,
    detector: BreakoutDetector,
    sizer: PositionSizer,
    ladder_params: LadderParams,
    trailing: Option<TrailingStop>,
    primary: BarWindow,
    ib_source: BarWindow,
    day: Option<DayState>,
    trade: Option<ActiveTrade>,
    feed_warnings: u64,
}

impl IbBreakoutStrategy {
    /// Validate the configuration and build a strategy with empty state
    pub fn new(config: StrategyConfig) -> StrategyResult<Self> {
        config.validate()?;
        let calendar = SessionCalendar::from_config(&config)?;

        let ib_lookback = lookback_for(config.ib_period_minutes, config.ib_source_minutes);

        Ok(Self {
            calendar,
            aggregator: IbAggregator::new(config.ib_source_minutes),
            detector: BreakoutDetector {
                breakout_by_close: config.breakout_by_close,
                use_opening_candle_filter: config.use_opening_candle_filter,
            },
            sizer: PositionSizer {
                risk_percent: config.risk_percent,
                fixed_lot_size: config.fixed_lot_size,
                tick_size: config.tick_size,
                point_value: config.point_value,
            },
            ladder_params: LadderParams::from(&config),
            trailing: config.use_trailing_stop.then_some(TrailingStop {
                percent: config.trailing_stop_percent,
            }),
            primary: BarWindow::new(BarStream::Primary, PRIMARY_HISTORY),
            ib_source: BarWindow::new(BarStream::IbSource, ib_lookback),
            day: None,
            trade: None,
            feed_warnings: 0,
            config,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn calendar(&self) -> &SessionCalendar {
        &self.calendar
    }

    pub fn day(&self) -> Option<&DayState> {
        self.day.as_ref()
    }

    pub fn active_trade(&self) -> Option<&ActiveTrade> {
        self.trade.as_ref()
    }

    pub fn ladder(&self) -> Option<&TpLadder> {
        self.trade.as_ref().and_then(|t| t.ladder.as_ref())
    }

    /// Non-fatal feed anomalies reported so far
    pub fn feed_warnings(&self) -> u64 {
        self.feed_warnings
    }

    /// Record a bar from the coarse IB-source stream
    pub fn on_ib_source_bar(&mut self, bar: &Bar) -> StrategyResult<()> {
        self.ib_source.push(*bar)?;
        debug!(
            "IB-source bar {} H={:.2} L={:.2}",
            self.calendar.local(bar.timestamp),
            bar.high,
            bar.low
        );
        Ok(())
    }

    /// Process a primary bar and return the intents it produced
    pub fn on_primary_bar<F>(&mut self, bar: &Bar, feed: &F) -> StrategyResult<Vec<OrderIntent>>
    where
        F: AccountFeed + PositionFeed + ?Sized,
    {
        self.primary.push(*bar)?;

        let now = self.calendar.local(bar.timestamp);
        self.roll_day(now.date());
        // Warm-up bars still build the opening candle
        if let Some(day) = self.day.as_mut() {
            day.opening_candle.observe(&day.ib_window, now, bar);
        }

        if self.primary.total_pushed() <= u64::from(self.config.bars_required_to_trade) {
            return Ok(Vec::new());
        }

        let position = feed.position();
        self.sync_trade(&position);

        let mut intents = Vec::new();

        if !self.calendar.is_in_session(bar.timestamp) {
            if self.config.close_at_session_end && !position.is_flat() {
                intents.extend(OrderIntent::flatten_all(SESSION_END_TAG));
                info!("Position closed at session end");
            }
            return Ok(intents);
        }

        self.form_initial_balance(now);

        if position.is_flat() {
            if let Some(entry) = self.check_breakout(bar, feed)? {
                intents.extend(entry);
            }
        }

        if self.config.use_partial_tp && !position.is_flat() {
            intents.extend(self.manage_ladder(&position, bar.close));
        }

        if !position.is_flat() {
            intents.extend(self.trail_stop(bar.close));
        }

        Ok(intents)
    }

    /// Reset all per-day state when the trading date changes
    fn roll_day(&mut self, date: NaiveDate) {
        if self.day.as_ref().is_some_and(|d| d.date == date) {
            return;
        }

        if self.day.is_some() {
            info!("Day closed: {}", self.status());
        }

        let window = self.calendar.ib_window(date);
        info!(
            "New day: {} | IB Period: {} - {}",
            date,
            window.start.format("%H:%M"),
            window.end.format("%H:%M")
        );
        self.day = Some(DayState::new(date, window));
        self.trade = None;
    }

    /// Reconcile the local trade record with the venue's position
    fn sync_trade(&mut self, position: &PositionState) {
        let use_ladder = self.config.use_partial_tp;
        let Some(trade) = self.trade.as_mut() else {
            return;
        };

        match position.direction() {
            None if trade.filled => {
                info!("Position flat - {} trade closed", trade.direction);
                self.trade = None;
            }
            None => {}
            Some(side) if side != trade.direction => {
                warn!(
                    "Venue reports {} position against {} entry; dropping trade state",
                    side, trade.direction
                );
                self.trade = None;
            }
            Some(side) if !trade.filled => {
                trade.filled = true;
                if use_ladder {
                    let ladder = TpLadder::new(side, trade.entry_tag.clone(), position.quantity);
                    trade.ladder = Some(ladder);
                }
                info!(
                    "Entry filled: {} {} @ {:.2}",
                    side, position.quantity, position.average_price
                );
            }
            Some(_) => {}
        }
    }

    fn form_initial_balance(&mut self, now: NaiveDateTime) {
        let Some(day) = self.day.as_mut() else {
            return;
        };
        if day.ib_formed() || now < day.ib_window.settles_at() {
            return;
        }

        match self
            .aggregator
            .reconcile(&day.ib_window, &self.ib_source, &self.calendar, now)
        {
            Reconciliation::Formed(range) => {
                day.ib = Some(range);
                info!(
                    "IB Formed from {} bars - High: {:.2} Low: {:.2} Range: {:.0} ticks",
                    range.bars,
                    range.high,
                    range.low,
                    range.width_ticks(self.config.tick_size)
                );

                if self.config.use_opening_candle_filter && !day.opening_candle_checked {
                    day.opening_bias = day.opening_candle.classify(&day.ib_window);
                    day.opening_candle_checked = true;
                }
            }
            Reconciliation::AwaitingSource => {
                debug!("IB-source closing bar not yet delivered at {}", now);
            }
            Reconciliation::SourceLagging { lag } => {
                if !day.lag_reported {
                    warn!(
                        "IB-source stream lags primary by {} min at {}; IB stays unformed",
                        lag.num_minutes(),
                        now
                    );
                    day.lag_reported = true;
                    self.feed_warnings += 1;
                }
            }
            Reconciliation::NoBars => {
                if !day.gap_reported {
                    warn!(
                        "IB NOT FOUND - no IB-source bars in {} - {}",
                        day.ib_window.start.format("%H:%M"),
                        day.ib_window.end.format("%H:%M")
                    );
                    day.gap_reported = true;
                    self.feed_warnings += 1;
                }
            }
        }
    }

    fn check_breakout<F>(&mut self, bar: &Bar, feed: &F) -> StrategyResult<Option<Vec<OrderIntent>>>
    where
        F: AccountFeed + ?Sized,
    {
        let Some(day) = self.day.as_mut() else {
            return Ok(None);
        };
        let Some(range) = day.ib else {
            return Ok(None);
        };
        if self.config.one_trade_per_day && day.trade_taken {
            return Ok(None);
        }

        let Some(direction) = self
            .detector
            .check(bar, &range, day.opening_bias, &mut day.latches)
        else {
            return Ok(None);
        };

        let (trade, intents) =
            build_entry(&self.config, &self.sizer, direction, bar, &range, feed)?;
        day.trade_taken = true;
        self.trade = Some(trade);
        Ok(Some(intents))
    }

    fn manage_ladder(&mut self, position: &PositionState, price: f64) -> Vec<OrderIntent> {
        let Some(range) = self.day.as_ref().and_then(|d| d.ib) else {
            return Vec::new();
        };
        let Some(trade) = self.trade.as_mut() else {
            return Vec::new();
        };
        let Some(ladder) = trade.ladder.as_mut() else {
            debug!("No ladder for open position");
            return Vec::new();
        };

        let mut outcome = ladder.manage(&self.ladder_params, position, price, range.width());

        if let Some(break_even) = outcome.break_even_stop {
            let trail_is_tighter = self.trailing.is_some()
                && trade.direction.profit(break_even, trade.stop) > 0.0;
            if trail_is_tighter {
                debug!(
                    "Trailing stop {:.2} already beyond break-even {:.2}",
                    trade.stop, break_even
                );
                outcome
                    .intents
                    .retain(|i| !matches!(i, OrderIntent::SetStopLoss { .. }));
            } else {
                trade.stop = break_even;
            }
        }

        outcome.intents
    }

    fn trail_stop(&mut self, price: f64) -> Option<OrderIntent> {
        let trail = self.trailing?;
        let trade = self.trade.as_mut().filter(|t| t.filled)?;
        let stop = trail.ratchet(trade.direction, trade.stop, price)?;
        trade.stop = stop;
        Some(OrderIntent::SetStopLoss {
            price: stop,
            entry_tag: trade.entry_tag.clone(),
        })
    }

    /// One-line summary of today's state
    pub fn status(&self) -> String {
        let Some(day) = &self.day else {
            return "No session yet".to_string();
        };

        let ib = day.ib.map_or_else(
            || "forming".to_string(),
            |r| format!("{:.2}-{:.2}", r.low, r.high),
        );
        let bias = day.opening_bias.map_or_else(|| "-".to_string(), |b| b.to_string());
        let ladder = self
            .ladder()
            .map_or_else(|| "-".to_string(), |l| l.stage().to_string());
        let position = match &self.trade {
            Some(t) if t.filled => format!("{} {}", t.direction, t.quantity),
            Some(t) => format!("{} pending", t.direction),
            None => "FLAT".to_string(),
        };

        format!(
            "{} | IB: {} | Bias: {} | Long: {:?} Short: {:?} | Traded: {} | Position: {} | Ladder: {}",
            day.date,
            ib,
            bias,
            day.latches.long,
            day.latches.short,
            day.trade_taken,
            position,
            ladder
        )
    }

    pub fn ladder_stage(&self) -> Option<LadderStage> {
        self.ladder().map(|l| l.stage())
    }
}

/// Build the bracket for a confirmed breakout
///
/// Entry at the bar close; stop at a fixed % of entry or the far side of the
/// IB; target at a multiple of the IB width.
fn build_entry<F>(
    config: &StrategyConfig,
    sizer: &PositionSizer,
    direction: Direction,
    bar: &Bar,
    range: &IbRange,
    feed: &F,
) -> StrategyResult<(ActiveTrade, Vec<OrderIntent>)>
where
    F: AccountFeed + ?Sized,
{
    let price = bar.close;
    let sign = direction.sign();

    let stop = if config.stop_loss_percent > 0.0 {
        price - sign * price * config.stop_loss_percent / 100.0
    } else {
        match direction {
            Direction::Long => range.low,
            Direction::Short => range.high,
        }
    };
    let target = price + sign * range.width() * config.target_multiplier();
    let stop_distance = direction.profit(stop, price);

    let equity = if sizer.uses_risk() {
        feed.equity(&config.account_currency)
            .ok_or_else(|| SizingError::EquityUnavailable(config.account_currency.clone()))?
    } else {
        0.0
    };
    let quantity = sizer.size(stop_distance, equity)?;

    let tag = match direction {
        Direction::Long => config.long_tag(),
        Direction::Short => config.short_tag(),
    };

    info!(
        "{} position opened at {:.2} SL: {:.2} TP: {:.2} Qty: {}",
        direction, price, stop, target, quantity
    );

    let intents = vec![
        OrderIntent::enter(direction, quantity, &tag),
        OrderIntent::SetStopLoss {
            price: stop,
            entry_tag: tag.clone(),
        },
        OrderIntent::SetProfitTarget {
            price: target,
            entry_tag: tag.clone(),
        },
    ];

    let trade = ActiveTrade {
        direction,
        entry_tag: tag,
        entry_price: price,
        quantity,
        stop,
        target,
        filled: false,
        ladder: None,
    };

    Ok((trade, intents))
}
