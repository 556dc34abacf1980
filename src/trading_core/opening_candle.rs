//! Opening candle classification for the directional filter

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::bars::Bar;
use super::session::IbWindow;

/// Direction of the candle spanning the IB window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpeningBias {
    Bullish,
    Bearish,
}

impl OpeningBias {
    /// A doji counts as bearish
    pub fn of(open: f64, close: f64) -> Self {
        if close > open {
            OpeningBias::Bullish
        } else {
            OpeningBias::Bearish
        }
    }
}

impl std::fmt::Display for OpeningBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpeningBias::Bullish => write!(f, "Bullish"),
            OpeningBias::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Running composite of the primary bars that opened inside the IB window
///
/// When the primary granularity equals the IB period this is the single bar
/// spanning the window. With finer primary bars it is built up bar by bar:
/// open of the first, close of the latest. Every primary bar is observed,
/// warm-up bars included, so the candle is never a partial window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OpeningCandle {
    open: Option<f64>,
    close: Option<f64>,
}

impl OpeningCandle {
    pub fn observe(&mut self, window: &IbWindow, local: NaiveDateTime, bar: &Bar) {
        if !window.contains(local) {
            return;
        }
        self.open.get_or_insert(bar.open);
        self.close = Some(bar.close);
    }

    /// Classify the candle; `None` when no primary bar opened inside the window
    pub fn classify(&self, window: &IbWindow) -> Option<OpeningBias> {
        let (Some(open), Some(close)) = (self.open, self.close) else {
            warn!(
                "Opening candle not found in {} - {}; directional filter will block entries",
                window.start, window.end
            );
            return None;
        };
        let bias = OpeningBias::of(open, close);
        info!("Opening candle: {} | Open: {:.2} Close: {:.2}", bias, open, close);
        Some(bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading_core::config::StrategyConfig;
    use crate::trading_core::session::SessionCalendar;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn setup() -> (SessionCalendar, IbWindow) {
        let cal = SessionCalendar::from_config(&StrategyConfig::default()).unwrap();
        let window = cal.ib_window(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        (cal, window)
    }

    fn et_bar(h: u32, m: u32, open: f64, close: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2025, 3, 3, h + 5, m, 0).unwrap();
        Bar::new(ts, open, open.max(close) + 1.0, open.min(close) - 1.0, close)
    }

    fn candle_from(cal: &SessionCalendar, window: &IbWindow, bars: &[Bar]) -> OpeningCandle {
        let mut candle = OpeningCandle::default();
        for bar in bars {
            candle.observe(window, cal.local(bar.timestamp), bar);
        }
        candle
    }

    #[test]
    fn test_single_ib_candle() {
        let (cal, window) = setup();
        let bars = [
            et_bar(8, 30, 100.0, 90.0),
            et_bar(9, 30, 100.0, 104.0),
            et_bar(10, 30, 104.0, 101.0),
        ];
        let candle = candle_from(&cal, &window, &bars);
        assert_eq!(candle.classify(&window), Some(OpeningBias::Bullish));
    }

    #[test]
    fn test_doji_is_bearish() {
        let (cal, window) = setup();
        let candle = candle_from(&cal, &window, &[et_bar(9, 30, 100.0, 100.0)]);
        assert_eq!(candle.classify(&window), Some(OpeningBias::Bearish));
    }

    #[test]
    fn test_composite_of_finer_bars() {
        let (cal, window) = setup();
        let bars = [
            et_bar(9, 30, 100.0, 99.0),
            et_bar(9, 50, 99.0, 98.0),
            et_bar(10, 10, 98.0, 103.0),
            // Opens at the window end: ignored
            et_bar(10, 30, 103.0, 90.0),
        ];
        let candle = candle_from(&cal, &window, &bars);
        assert_eq!(candle.classify(&window), Some(OpeningBias::Bullish));
    }

    #[test]
    fn test_missing_candle_is_unset() {
        let (cal, window) = setup();
        let candle = candle_from(&cal, &window, &[et_bar(10, 30, 100.0, 104.0)]);
        assert_eq!(candle.classify(&window), None);
        assert_eq!(OpeningCandle::default().classify(&window), None);
    }
}
