//! Configuration for the IB breakout strategy

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Strategy parameters, immutable for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Trading session start hour (exchange local time, 24h)
    pub session_start_hour: u32,
    pub session_start_minute: u32,
    /// Trading session end hour (exchange local time, 24h)
    pub session_end_hour: u32,
    pub session_end_minute: u32,
    /// IANA timezone the session hours are expressed in
    pub timezone: String,

    /// Length of the Initial Balance window in minutes
    pub ib_period_minutes: u32,
    /// Bar size of the IB-source stream in minutes
    pub ib_source_minutes: u32,
    /// Breakout measured by close (true) or by high/low (false)
    pub breakout_by_close: bool,
    /// Primary bars to observe before any decision is made
    pub bars_required_to_trade: u32,

    /// Risk per trade as % of equity (0 = use fixed lot size)
    pub risk_percent: f64,
    pub fixed_lot_size: u32,
    /// Stop loss as % of entry (0 = opposite side of the IB)
    pub stop_loss_percent: f64,
    pub use_trailing_stop: bool,
    pub trailing_stop_percent: f64,

    pub one_trade_per_day: bool,
    pub close_at_session_end: bool,
    pub use_opening_candle_filter: bool,

    pub use_partial_tp: bool,
    /// Profit targets as multiples of the IB range
    pub tp1_multiplier: f64,
    pub tp1_close_percent: f64,
    pub tp2_multiplier: f64,
    /// Taken of the quantity remaining after TP1
    pub tp2_close_percent: f64,
    pub tp3_multiplier: f64,
    pub move_to_break_even: bool,

    /// Symbol traded (informational, used in logs)
    pub symbol: String,
    /// Minimum price increment
    pub tick_size: f64,
    /// Dollar value used by the sizing formula (NQ = $5 per tick)
    pub point_value: f64,
    /// Currency passed to the account feed
    pub account_currency: String,
    /// Prefix for entry tags ("IB Long" / "IB Short")
    pub entry_tag_prefix: String,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            session_start_hour: 9,
            session_start_minute: 30,
            session_end_hour: 16,
            session_end_minute: 0,
            timezone: "America/New_York".to_string(),
            ib_period_minutes: 60,
            ib_source_minutes: 30,
            breakout_by_close: true,
            bars_required_to_trade: 20,
            risk_percent: 1.0,
            fixed_lot_size: 1,
            stop_loss_percent: 0.0,
            use_trailing_stop: false,
            trailing_stop_percent: 0.5,
            one_trade_per_day: true,
            close_at_session_end: true,
            use_opening_candle_filter: true,
            use_partial_tp: true,
            tp1_multiplier: 0.5,
            tp1_close_percent: 33.0,
            tp2_multiplier: 1.0,
            tp2_close_percent: 33.0,
            tp3_multiplier: 2.0,
            move_to_break_even: true,
            symbol: "NQ".to_string(),
            tick_size: 0.25,
            point_value: 5.0,
            account_currency: "USD".to_string(),
            entry_tag_prefix: "IB".to_string(),
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl StrategyConfig {
    /// Reject any parameter outside its documented range
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("session_start_hour", self.session_start_hour as f64, 0.0, 23.0)?;
        check_range("session_start_minute", self.session_start_minute as f64, 0.0, 59.0)?;
        check_range("session_end_hour", self.session_end_hour as f64, 0.0, 23.0)?;
        check_range("session_end_minute", self.session_end_minute as f64, 0.0, 59.0)?;
        check_range("ib_period_minutes", self.ib_period_minutes as f64, 1.0, 240.0)?;
        check_range("ib_source_minutes", self.ib_source_minutes as f64, 1.0, 240.0)?;
        check_range("risk_percent", self.risk_percent, 0.0, 100.0)?;
        check_range("fixed_lot_size", self.fixed_lot_size as f64, 1.0, u32::MAX as f64)?;
        check_range("stop_loss_percent", self.stop_loss_percent, 0.0, 100.0)?;
        check_range("trailing_stop_percent", self.trailing_stop_percent, 0.1, 10.0)?;
        check_range("tp1_multiplier", self.tp1_multiplier, 0.1, 10.0)?;
        check_range("tp1_close_percent", self.tp1_close_percent, 1.0, 100.0)?;
        check_range("tp2_multiplier", self.tp2_multiplier, 0.1, 10.0)?;
        check_range("tp2_close_percent", self.tp2_close_percent, 1.0, 100.0)?;
        check_range("tp3_multiplier", self.tp3_multiplier, 0.1, 10.0)?;

        if !(self.tick_size.is_finite() && self.tick_size > 0.0) {
            return Err(ConfigError::NonPositive { field: "tick_size" });
        }
        if !(self.point_value.is_finite() && self.point_value > 0.0) {
            return Err(ConfigError::NonPositive { field: "point_value" });
        }

        let start = self.session_start();
        let end = self.session_end();
        if end <= start {
            return Err(ConfigError::EmptySession {
                start: start.format("%H:%M").to_string(),
                end: end.format("%H:%M").to_string(),
            });
        }

        let ib_end_minutes = self.session_start_hour * 60
            + self.session_start_minute
            + self.ib_period_minutes;
        let end_minutes = self.session_end_hour * 60 + self.session_end_minute;
        if ib_end_minutes > end_minutes {
            return Err(ConfigError::IbBeyondSession {
                ib_end: format!("{:02}:{:02}", ib_end_minutes / 60, ib_end_minutes % 60),
                session_end: end.format("%H:%M").to_string(),
            });
        }

        self.tz()?;
        Ok(())
    }

    pub fn session_start(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.session_start_hour, self.session_start_minute, 0)
            .unwrap_or(NaiveTime::MIN)
    }

    pub fn session_end(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.session_end_hour, self.session_end_minute, 0)
            .unwrap_or(NaiveTime::MIN)
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn long_tag(&self) -> String {
        format!("{} Long", self.entry_tag_prefix)
    }

    pub fn short_tag(&self) -> String {
        format!("{} Short", self.entry_tag_prefix)
    }

    /// Target multiple used at entry; fixed 2x when the ladder is off
    pub fn target_multiplier(&self) -> f64 {
        if self.use_partial_tp {
            self.tp3_multiplier
        } else {
            2.0
        }
    }
}
