//! End-to-end scenarios: strategy driven bar by bar against the paper venue

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ib_breakout::execution::PaperVenue;
use ib_breakout::trading_core::{
    Bar, BreakoutLatches, FeedSnapshot, IbBreakoutStrategy, LadderStage, OrderIntent,
    PositionFeed, PositionState, StrategyConfig, SESSION_END_TAG,
};

/// New York wall-clock in March 2025 (EST, UTC-5)
fn et(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, h + 5, m, 0).unwrap()
}

fn config() -> StrategyConfig {
    StrategyConfig {
        bars_required_to_trade: 0,
        use_opening_candle_filter: false,
        risk_percent: 0.0,
        fixed_lot_size: 10,
        ..Default::default()
    }
}

/// Flat-range bar closing at `close`
fn at(day: u32, h: u32, m: u32, close: f64) -> Bar {
    Bar::new(et(day, h, m), close, close + 0.25, close - 0.25, close)
}

struct Session {
    strategy: IbBreakoutStrategy,
    venue: PaperVenue,
    log: Vec<(DateTime<Utc>, OrderIntent)>,
}

impl Session {
    fn new(config: StrategyConfig) -> Self {
        Self {
            venue: PaperVenue::new(&config, 50_000.0).unwrap(),
            strategy: IbBreakoutStrategy::new(config).unwrap(),
            log: Vec::new(),
        }
    }

    /// The two IB-source bars of the reference scenario: H108 / L100
    fn standard_ib(&mut self, day: u32) {
        self.ib(Bar::new(et(day, 9, 30), 101.0, 105.0, 100.0, 104.0));
        self.ib(Bar::new(et(day, 10, 0), 104.0, 108.0, 102.0, 107.0));
    }

    fn ib(&mut self, bar: Bar) {
        self.strategy.on_ib_source_bar(&bar).unwrap();
    }

    fn primary(&mut self, bar: Bar) -> Vec<OrderIntent> {
        self.venue.on_bar(&bar);
        let intents = self.strategy.on_primary_bar(&bar, &self.venue).unwrap();
        for intent in &intents {
            self.venue.submit(intent, &bar);
            self.log.push((bar.timestamp, intent.clone()));
        }
        intents
    }

    fn entries(&self) -> Vec<&OrderIntent> {
        self.log.iter().map(|(_, i)| i).filter(|i| i.is_entry()).collect()
    }

    fn exit_tags(&self) -> Vec<(DateTime<Utc>, String)> {
        self.log
            .iter()
            .filter_map(|(t, i)| match i {
                OrderIntent::ExitLong { exit_tag, .. }
                | OrderIntent::ExitShort { exit_tag, .. } => Some((*t, exit_tag.clone())),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn test_reference_scenario_single_long_at_109() {
    let mut s = Session::new(config());
    s.standard_ib(3);

    assert!(s.primary(at(3, 10, 30, 107.0)).is_empty());
    let intents = s.primary(at(3, 10, 31, 109.0));

    let range = s.strategy.day().unwrap().ib.unwrap();
    assert_eq!((range.high, range.low), (108.0, 100.0));
    assert_eq!(
        intents[0],
        OrderIntent::EnterLong {
            quantity: 10,
            tag: "IB Long".to_string()
        }
    );

    let position = s.venue.position();
    assert_eq!(position.quantity, 10);
    assert_eq!(position.average_price, 109.0);
}

#[test]
fn test_triple_cross_fires_long_once() {
    let mut strategy = IbBreakoutStrategy::new(StrategyConfig {
        one_trade_per_day: false,
        ..config()
    })
    .unwrap();
    strategy
        .on_ib_source_bar(&Bar::new(et(3, 9, 30), 101.0, 105.0, 100.0, 104.0))
        .unwrap();
    strategy
        .on_ib_source_bar(&Bar::new(et(3, 10, 0), 104.0, 108.0, 102.0, 107.0))
        .unwrap();

    // Venue never fills, so the strategy stays flat and keeps checking
    let flat = FeedSnapshot {
        equity: Some(50_000.0),
        position: PositionState::flat(),
    };
    let path = [109.0, 107.0, 110.0, 106.0, 111.0, 107.5];
    let mut longs = 0;
    for (i, close) in path.iter().enumerate() {
        let intents = strategy
            .on_primary_bar(&at(3, 10, 31 + i as u32, *close), &flat)
            .unwrap();
        longs += intents
            .iter()
            .filter(|intent| matches!(intent, OrderIntent::EnterLong { .. }))
            .count();
    }
    assert_eq!(longs, 1);
    assert!(strategy.day().unwrap().latches.long.is_fired());
}

#[test]
fn test_bearish_opening_candle_blocks_longs() {
    let mut s = Session::new(StrategyConfig {
        use_opening_candle_filter: true,
        ..config()
    });
    s.standard_ib(3);

    // Opening hour on the primary stream: 104 -> 102
    s.primary(Bar::new(et(3, 9, 30), 104.0, 105.0, 100.0, 101.0));
    s.primary(Bar::new(et(3, 10, 0), 101.0, 108.0, 100.5, 102.0));

    for (i, close) in [109.0, 110.0, 112.0].iter().enumerate() {
        s.primary(at(3, 10, 31 + i as u32, *close));
    }
    assert!(s.entries().is_empty());
    assert_eq!(
        s.strategy.day().unwrap().opening_bias.map(|b| b.to_string()),
        Some("Bearish".to_string())
    );

    // Shorts remain allowed
    s.primary(at(3, 10, 40, 99.0));
    let entries = s.entries();
    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0], OrderIntent::EnterShort { .. }));
}

#[test]
fn test_bullish_opening_candle_blocks_shorts() {
    let mut s = Session::new(StrategyConfig {
        use_opening_candle_filter: true,
        ..config()
    });
    s.standard_ib(3);

    // Opening hour on the primary stream: 101 -> 107
    s.primary(Bar::new(et(3, 9, 30), 101.0, 105.0, 100.0, 104.0));
    s.primary(Bar::new(et(3, 10, 0), 104.0, 108.0, 102.0, 107.0));

    for (i, close) in [99.0, 98.0, 97.5].iter().enumerate() {
        s.primary(at(3, 10, 31 + i as u32, *close));
    }
    assert!(s.entries().is_empty());
    assert!(!s.strategy.day().unwrap().latches.short.is_fired());

    // Longs remain allowed
    s.primary(at(3, 10, 40, 109.0));
    let entries = s.entries();
    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0], OrderIntent::EnterLong { .. }));
}

#[test]
fn test_one_minute_opening_hour_sets_bias() {
    let mut s = Session::new(StrategyConfig {
        use_opening_candle_filter: true,
        ..config()
    });
    s.standard_ib(3);

    // Sixty 1-minute bars drifting 101 -> 107, far more than the primary ring holds
    for i in 0..60u32 {
        let close = 101.0 + f64::from(i) * 0.1;
        let ts = et(3, 9, 30) + chrono::Duration::minutes(i64::from(i));
        s.primary(Bar::new(ts, close, close + 0.25, close - 0.25, close));
    }
    s.primary(at(3, 10, 30, 107.0));
    s.primary(at(3, 10, 31, 109.0));

    assert_eq!(
        s.strategy.day().unwrap().opening_bias.map(|b| b.to_string()),
        Some("Bullish".to_string())
    );
    let entries = s.entries();
    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0], OrderIntent::EnterLong { .. }));
}

#[test]
fn test_missing_opening_candle_blocks_everything() {
    let mut s = Session::new(StrategyConfig {
        use_opening_candle_filter: true,
        ..config()
    });
    s.standard_ib(3);
    s.primary(at(3, 10, 31, 109.0));
    s.primary(at(3, 10, 32, 99.0));
    assert!(s.entries().is_empty());
    assert_eq!(s.strategy.day().unwrap().opening_bias, None);
    assert!(s.strategy.day().unwrap().opening_candle_checked);
}

#[test]
fn test_ladder_tp2_waits_for_a_later_bar() {
    let mut s = Session::new(config());
    s.standard_ib(3);
    s.primary(at(3, 10, 31, 109.0));

    // +9 = 1.125x IB clears both TP1 and TP2 thresholds at once
    let first = s.primary(at(3, 10, 32, 118.0));
    assert_eq!(s.strategy.ladder_stage(), Some(LadderStage::Tp1Hit));
    assert!(first.contains(&OrderIntent::ExitLong {
        quantity: Some(3),
        exit_tag: "TP1".to_string(),
        entry_tag: Some("IB Long".to_string()),
    }));
    assert_eq!(s.venue.working_stop(), Some(109.0));
    assert_eq!(s.venue.position().quantity, 7);

    let second = s.primary(at(3, 10, 33, 118.0));
    assert_eq!(s.strategy.ladder_stage(), Some(LadderStage::Tp2Hit));
    assert_eq!(
        second,
        vec![OrderIntent::ExitLong {
            quantity: Some(2),
            exit_tag: "TP2".to_string(),
            entry_tag: Some("IB Long".to_string()),
        }]
    );
    assert_eq!(s.venue.position().quantity, 5);

    let tags: Vec<_> = s.exit_tags().into_iter().map(|(_, t)| t).collect();
    assert_eq!(tags, vec!["TP1", "TP2"]);
}

#[test]
fn test_break_even_stop_protects_remainder() {
    let mut s = Session::new(config());
    s.standard_ib(3);
    s.primary(at(3, 10, 31, 109.0));
    s.primary(at(3, 10, 32, 113.0));

    // Back through the entry: stopped out at break-even
    s.primary(Bar::new(et(3, 10, 33), 112.0, 112.5, 108.0, 108.5));
    assert!(s.venue.position().is_flat());
    let trades = s.venue.positions().trade_history();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[1].exit_price, 109.0);
    assert_eq!(trades[1].pnl_dollars, 0.0);
}

#[test]
fn test_session_end_flattens_once() {
    let mut s = Session::new(config());
    s.standard_ib(3);
    s.primary(at(3, 10, 31, 109.0));
    s.primary(at(3, 15, 59, 110.0));

    let intents = s.primary(at(3, 16, 0, 110.5));
    assert_eq!(intents, OrderIntent::flatten_all(SESSION_END_TAG).to_vec());
    assert!(s.venue.position().is_flat());

    assert!(s.primary(at(3, 16, 1, 111.0)).is_empty());
    let flattens = s
        .exit_tags()
        .iter()
        .filter(|(_, tag)| tag == SESSION_END_TAG)
        .count();
    assert_eq!(flattens, 2);
}

#[test]
fn test_position_held_past_session_end_when_flatten_disabled() {
    let mut s = Session::new(StrategyConfig {
        close_at_session_end: false,
        ..config()
    });
    s.standard_ib(3);
    s.primary(at(3, 10, 31, 109.0));

    assert!(s.primary(at(3, 16, 0, 110.5)).is_empty());
    assert!(s.primary(at(3, 16, 1, 111.0)).is_empty());
    assert_eq!(s.venue.position().quantity, 10);
    assert!(s.exit_tags().iter().all(|(_, tag)| tag != SESSION_END_TAG));
}

#[test]
fn test_short_flatten_also_emits_both_sides() {
    let mut s = Session::new(config());
    s.standard_ib(3);
    s.primary(at(3, 10, 31, 99.0));
    let intents = s.primary(at(3, 16, 0, 98.0));
    assert_eq!(intents.len(), 2);
    assert!(s.venue.position().is_flat());
}

#[test]
fn test_new_day_resets_and_trades_again() {
    let mut s = Session::new(config());
    s.standard_ib(3);
    s.primary(at(3, 10, 31, 109.0));
    s.primary(at(3, 10, 32, 113.0));
    s.primary(at(3, 16, 0, 113.0));

    s.primary(at(4, 9, 0, 110.0));
    let day = s.strategy.day().unwrap();
    assert_eq!(day.date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    assert!(!day.ib_formed());
    assert_eq!(day.latches, BreakoutLatches::default());
    assert!(!day.trade_taken);
    assert!(s.strategy.ladder().is_none());

    s.standard_ib(4);
    s.primary(at(4, 10, 31, 109.5));
    assert_eq!(s.entries().len(), 2);
}

#[test]
fn test_risk_sizing_reads_venue_equity() {
    let mut s = Session::new(StrategyConfig {
        risk_percent: 1.0,
        ..config()
    });
    s.standard_ib(3);
    // Stop 9 points = 36 ticks * $5 = $180 per contract; $500 / 180 = 2
    let intents = s.primary(at(3, 10, 31, 109.0));
    assert!(matches!(intents[0], OrderIntent::EnterLong { quantity: 2, .. }));
}

#[test]
fn test_empty_ib_window_stays_unformed() {
    let mut s = Session::new(config());
    s.ib(Bar::new(et(3, 9, 0), 100.0, 101.0, 99.0, 100.0));
    s.ib(Bar::new(et(3, 10, 30), 100.0, 112.0, 99.0, 110.0));

    s.primary(at(3, 10, 31, 120.0));
    s.primary(at(3, 10, 32, 80.0));
    assert!(!s.strategy.day().unwrap().ib_formed());
    assert!(s.entries().is_empty());
    assert_eq!(s.strategy.feed_warnings(), 1);
}

#[test]
fn test_out_of_order_ib_source_rejected() {
    let mut s = Session::new(config());
    s.ib(Bar::new(et(3, 10, 0), 104.0, 108.0, 102.0, 107.0));
    let err = s
        .strategy
        .on_ib_source_bar(&Bar::new(et(3, 9, 30), 101.0, 105.0, 100.0, 104.0))
        .unwrap_err();
    assert!(err.to_string().contains("ib-source"));
}
