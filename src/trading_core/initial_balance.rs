//! Initial Balance aggregation
//!
//! Folds the IB-source bars that opened inside the IB window into a high/low
//! range. Only the bounded recent history is scanned: older bars cannot belong
//! to today's window.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::bars::{bar_period, Bar, BarWindow};
use super::session::{IbWindow, SessionCalendar};

/// High/low range formed during the opening window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IbRange {
    pub high: f64,
    pub low: f64,
    /// Number of IB-source bars folded in
    pub bars: usize,
}

impl IbRange {
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn width_ticks(&self, tick_size: f64) -> f64 {
        self.width() / tick_size
    }

    fn fold(self, bar: &Bar) -> Self {
        Self {
            high: self.high.max(bar.high),
            low: self.low.min(bar.low),
            bars: self.bars + 1,
        }
    }
}

/// Outcome of one reconciliation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Formed(IbRange),
    /// The IB-source bar closing the window has not arrived yet; within tolerance
    AwaitingSource,
    /// The IB-source stream lags the primary clock by more than one bar period
    SourceLagging { lag: Duration },
    /// The source is current but no bar opened inside the window (feed gap)
    NoBars,
}

/// Max/min over a set of bars; `None` when the set is empty
pub fn aggregate_range<'a>(bars: impl IntoIterator<Item = &'a Bar>) -> Option<IbRange> {
    bars.into_iter().fold(None, |acc, bar| {
        Some(match acc {
            None => IbRange {
                high: bar.high,
                low: bar.low,
                bars: 1,
            },
            Some(range) => range.fold(bar),
        })
    })
}

#[derive(Debug, Clone, Copy)]
pub struct IbAggregator {
    source_period: Duration,
}

impl IbAggregator {
    pub fn new(ib_source_minutes: u32) -> Self {
        Self {
            source_period: bar_period(ib_source_minutes),
        }
    }

    /// Try to build today's IB range from the retained IB-source bars
    ///
    /// `now` is the local time of the primary bar driving the attempt.
    pub fn reconcile(
        &self,
        window: &IbWindow,
        history: &BarWindow,
        calendar: &SessionCalendar,
        now: NaiveDateTime,
    ) -> Reconciliation {
        let latest_close = history
            .latest()
            .map(|bar| calendar.local(bar.timestamp) + self.source_period);

        match latest_close {
            Some(close) if close >= window.end => {}
            Some(close) if now - close <= self.source_period => {
                return Reconciliation::AwaitingSource;
            }
            Some(close) => {
                return Reconciliation::SourceLagging { lag: now - close };
            }
            None => {
                return Reconciliation::SourceLagging {
                    lag: now - window.start,
                };
            }
        }

        let day = window.start.date();
        let qualifying = history.iter_recent().filter(|bar| {
            let local = calendar.local(bar.timestamp);
            local.date() == day && window.contains(local)
        });

        match aggregate_range(qualifying) {
            Some(range) => Reconciliation::Formed(range),
            None => Reconciliation::NoBars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading_core::bars::BarStream;
    use crate::trading_core::config::StrategyConfig;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn et_bar(h: u32, m: u32, high: f64, low: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2025, 3, 3, h + 5, m, 0).unwrap();
        Bar::new(ts, low, high, low, high)
    }

    fn setup() -> (SessionCalendar, IbWindow, IbAggregator) {
        let cal = SessionCalendar::from_config(&StrategyConfig::default()).unwrap();
        let window = cal.ib_window(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        (cal, window, IbAggregator::new(30))
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_range_from_window_bars() {
        let (cal, window, agg) = setup();
        let mut history = BarWindow::new(BarStream::IbSource, 10);
        history.push(et_bar(9, 0, 120.0, 90.0)).unwrap();
        history.push(et_bar(9, 30, 105.0, 100.0)).unwrap();
        history.push(et_bar(10, 0, 108.0, 102.0)).unwrap();

        let result = agg.reconcile(&window, &history, &cal, at(10, 31));
        assert_eq!(
            result,
            Reconciliation::Formed(IbRange {
                high: 108.0,
                low: 100.0,
                bars: 2
            })
        );
    }

    #[test]
    fn test_bar_after_window_excluded() {
        let (cal, window, agg) = setup();
        let mut history = BarWindow::new(BarStream::IbSource, 10);
        history.push(et_bar(9, 30, 105.0, 100.0)).unwrap();
        history.push(et_bar(10, 0, 108.0, 102.0)).unwrap();
        history.push(et_bar(10, 30, 130.0, 80.0)).unwrap();

        match agg.reconcile(&window, &history, &cal, at(11, 1)) {
            Reconciliation::Formed(range) => {
                assert_eq!(range.high, 108.0);
                assert_eq!(range.low, 100.0);
            }
            other => panic!("expected formed range, got {:?}", other),
        }
    }

    #[test]
    fn test_awaiting_closing_bar() {
        let (cal, window, agg) = setup();
        let mut history = BarWindow::new(BarStream::IbSource, 10);
        history.push(et_bar(9, 30, 105.0, 100.0)).unwrap();

        // Source bar closed at 10:00; at 10:20 that is within one bar period
        assert_eq!(
            agg.reconcile(&window, &history, &cal, at(10, 20)),
            Reconciliation::AwaitingSource
        );
        // At 10:31 the source is 31 minutes behind
        assert!(matches!(
            agg.reconcile(&window, &history, &cal, at(10, 31)),
            Reconciliation::SourceLagging { .. }
        ));
    }

    #[test]
    fn test_gap_in_window_is_not_zero_width() {
        let (cal, window, agg) = setup();
        let mut history = BarWindow::new(BarStream::IbSource, 10);
        history.push(et_bar(8, 30, 105.0, 100.0)).unwrap();
        history.push(et_bar(10, 30, 108.0, 102.0)).unwrap();

        assert_eq!(
            agg.reconcile(&window, &history, &cal, at(11, 1)),
            Reconciliation::NoBars
        );
    }

    #[test]
    fn test_empty_history_is_lagging() {
        let (cal, window, agg) = setup();
        let history = BarWindow::new(BarStream::IbSource, 10);
        assert!(matches!(
            agg.reconcile(&window, &history, &cal, at(10, 31)),
            Reconciliation::SourceLagging { .. }
        ));
    }

    #[test]
    fn test_aggregate_range_empty() {
        assert!(aggregate_range(std::iter::empty::<&Bar>()).is_none());
    }
}
