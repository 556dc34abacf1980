//! Bar types and bounded bar history
//!
//! Both feeds deliver bars stamped with their *open* time. The strategy only
//! ever looks a few bars back, so history is kept in a fixed-capacity ring.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::FeedError;

/// OHLCV bar for one granularity stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 0,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Reject bars whose prices cannot describe a real candle
    pub fn validate(&self, stream: BarStream) -> Result<(), FeedError> {
        let malformed = |reason: &str| FeedError::Malformed {
            stream,
            timestamp: self.timestamp,
            reason: reason.to_string(),
        };

        if ![self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite())
        {
            return Err(malformed("non-finite price"));
        }
        if self.high < self.low {
            return Err(malformed("high below low"));
        }
        if self.open > self.high || self.open < self.low {
            return Err(malformed("open outside high/low"));
        }
        if self.close > self.high || self.close < self.low {
            return Err(malformed("close outside high/low"));
        }
        Ok(())
    }
}

/// Which of the two subscribed granularities a bar came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarStream {
    /// Fine-grained decision clock
    Primary,
    /// Coarser series used only for the IB range
    IbSource,
}

impl std::fmt::Display for BarStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarStream::Primary => write!(f, "primary"),
            BarStream::IbSource => write!(f, "ib-source"),
        }
    }
}

/// Fixed-capacity window over the most recent bars of one stream
///
/// Pushing enforces strictly increasing timestamps; the oldest bar is evicted
/// once capacity is reached.
#[derive(Debug, Clone)]
pub struct BarWindow {
    stream: BarStream,
    bars: VecDeque<Bar>,
    capacity: usize,
    pushed: u64,
}

impl BarWindow {
    pub fn new(stream: BarStream, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            stream,
            bars: VecDeque::with_capacity(capacity),
            capacity,
            pushed: 0,
        }
    }

    /// Validate and append a bar
    pub fn push(&mut self, bar: Bar) -> Result<(), FeedError> {
        bar.validate(self.stream)?;

        if let Some(last) = self.bars.back() {
            if bar.timestamp <= last.timestamp {
                return Err(FeedError::OutOfOrder {
                    stream: self.stream,
                    previous: last.timestamp,
                    current: bar.timestamp,
                });
            }
        }

        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        self.pushed += 1;
        Ok(())
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Iterate newest first, the way the lookback scans walk history
    pub fn iter_recent(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Total bars ever accepted, including evicted ones
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }
}

/// Bars needed to cover `window_minutes` at `bar_minutes` granularity, plus slack
pub fn lookback_for(window_minutes: u32, bar_minutes: u32) -> usize {
    let bar_minutes = bar_minutes.max(1);
    let covering = window_minutes.div_ceil(bar_minutes) as usize;
    (covering + 2).max(10)
}

/// Duration of one bar of the given granularity
pub fn bar_period(minutes: u32) -> Duration {
    Duration::minutes(i64::from(minutes))
}
