//! Session Calendar
//!
//! Pure time-of-day checks against the configured session. Bar timestamps are
//! UTC; everything here is evaluated on exchange-local wall-clock time.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use super::config::StrategyConfig;
use crate::error::ConfigError;

/// Settlement buffer after the IB window closes before the range is read
pub const IB_SETTLEMENT_MINUTES: i64 = 1;

#[derive(Debug, Clone, Copy)]
pub struct SessionCalendar {
    tz: Tz,
    start: NaiveTime,
    end: NaiveTime,
    ib_period: Duration,
}

/// IB formation window for one trading day, in local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IbWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl IbWindow {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.start && t < self.end
    }

    /// Earliest primary-bar time at which the IB range may be reconciled
    pub fn settles_at(&self) -> NaiveDateTime {
        self.end + Duration::minutes(IB_SETTLEMENT_MINUTES)
    }
}

impl SessionCalendar {
    pub fn from_config(config: &StrategyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tz: config.tz()?,
            start: config.session_start(),
            end: config.session_end(),
            ib_period: Duration::minutes(i64::from(config.ib_period_minutes)),
        })
    }

    /// Local wall-clock time of a UTC timestamp
    pub fn local(&self, t: DateTime<Utc>) -> NaiveDateTime {
        t.with_timezone(&self.tz).naive_local()
    }

    /// Trading date a timestamp belongs to
    pub fn trading_date(&self, t: DateTime<Utc>) -> NaiveDate {
        self.local(t).date()
    }

    /// True iff the local time-of-day lies in [session start, session end)
    pub fn is_in_session(&self, t: DateTime<Utc>) -> bool {
        let time = self.local(t).time();
        time >= self.start && time < self.end
    }

    pub fn ib_window(&self, date: NaiveDate) -> IbWindow {
        let start = date.and_time(self.start);
        IbWindow {
            start,
            end: start + self.ib_period,
        }
    }
}
