//! Replay driver
//!
//! Drives the strategy against the paper venue over historical bars, the
//! same way a live session would deliver them: each bar becomes visible only
//! once it has closed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

use crate::error::StrategyError;
use crate::execution::{PaperVenue, TradeRecord};
use crate::trading_core::bars::bar_period;
use crate::trading_core::{Bar, BarStream, IbBreakoutStrategy, OrderIntent, StrategyConfig};

/// A bar tagged with its stream, ordered by when it becomes available
#[derive(Debug, Clone, Copy)]
pub struct StreamBar<'a> {
    pub stream: BarStream,
    pub bar: &'a Bar,
}

/// Interleave both streams by close time, IB-source first on ties
pub fn merge_streams<'a>(
    primary: &'a [Bar],
    primary_minutes: u32,
    ib_source: &'a [Bar],
    ib_source_minutes: u32,
) -> Vec<StreamBar<'a>> {
    let primary_period = bar_period(primary_minutes);
    let source_period = bar_period(ib_source_minutes);

    let mut events: Vec<_> = ib_source
        .iter()
        .map(|bar| {
            let event = StreamBar {
                stream: BarStream::IbSource,
                bar,
            };
            (bar.timestamp + source_period, 0u8, event)
        })
        .chain(primary.iter().map(|bar| {
            let event = StreamBar {
                stream: BarStream::Primary,
                bar,
            };
            (bar.timestamp + primary_period, 1u8, event)
        }))
        .collect();

    // Stable: bars within a stream keep their file order
    events.sort_by_key(|(available, rank, _)| (*available, *rank));
    events.into_iter().map(|(_, _, event)| event).collect()
}

/// Historical bars for one replay
#[derive(Debug, Clone)]
pub struct ReplayData {
    pub primary: Vec<Bar>,
    pub primary_minutes: u32,
    pub ib_source: Vec<Bar>,
}

/// Aggregate results of a replay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub primary_bars: usize,
    pub ib_source_bars: usize,
    pub trading_days: usize,
    pub entries: usize,
    /// Closed trade legs, partial exits included
    pub exits: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_pnl: f64,
    pub max_drawdown: f64,
    pub starting_balance: f64,
    pub final_balance: f64,
    pub feed_warnings: u64,
    pub rejected_entries: usize,
}

impl ReplaySummary {
    fn from_trades(trades: &[TradeRecord]) -> Self {
        let wins = trades.iter().filter(|t| t.pnl_dollars > 0.0).count();
        let gross_profit: f64 = trades
            .iter()
            .filter(|t| t.pnl_dollars > 0.0)
            .map(|t| t.pnl_dollars)
            .sum();
        let gross_loss: f64 = trades
            .iter()
            .filter(|t| t.pnl_dollars <= 0.0)
            .map(|t| t.pnl_dollars.abs())
            .sum();

        Self {
            exits: trades.len(),
            wins,
            losses: trades.len() - wins,
            win_rate: if trades.is_empty() {
                0.0
            } else {
                wins as f64 / trades.len() as f64 * 100.0
            },
            profit_factor: if gross_loss > 0.0 {
                gross_profit / gross_loss
            } else {
                0.0
            },
            gross_profit,
            gross_loss,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub summary: ReplaySummary,
    pub trades: Vec<TradeRecord>,
}

/// Run one replay from a clean strategy and venue
pub fn run_replay(
    config: StrategyConfig,
    data: &ReplayData,
    starting_balance: f64,
) -> Result<ReplayReport> {
    let ib_source_minutes = config.ib_source_minutes;
    let mut venue = PaperVenue::new(&config, starting_balance)?;
    let mut strategy = IbBreakoutStrategy::new(config)?;

    let events = merge_streams(
        &data.primary,
        data.primary_minutes,
        &data.ib_source,
        ib_source_minutes,
    );

    let mut entries = 0;
    let mut rejected_entries = 0;
    let mut days = std::collections::BTreeSet::new();

    for event in events {
        let bar = event.bar;
        match event.stream {
            BarStream::IbSource => strategy
                .on_ib_source_bar(bar)
                .context("IB-source stream rejected")?,
            BarStream::Primary => {
                venue.on_bar(bar);

                let intents = match strategy.on_primary_bar(bar, &venue) {
                    Ok(intents) => intents,
                    Err(StrategyError::Sizing(e)) => {
                        error!("Entry rejected at {}: {}", bar.timestamp, e);
                        rejected_entries += 1;
                        continue;
                    }
                    Err(e) => return Err(e).context("Primary stream rejected"),
                };

                if let Some(day) = strategy.day() {
                    days.insert(day.date);
                }
                entries += intents.iter().filter(|i| i.is_entry()).count();
                apply_intents(&mut venue, &intents, bar);
            }
        }
    }

    let trades = venue.positions().trade_history().to_vec();
    let mut summary = ReplaySummary::from_trades(&trades);
    summary.primary_bars = data.primary.len();
    summary.ib_source_bars = data.ib_source.len();
    summary.trading_days = days.len();
    summary.entries = entries;
    summary.net_pnl = venue.positions().net_pnl();
    summary.max_drawdown = venue.positions().max_drawdown();
    summary.starting_balance = starting_balance;
    summary.final_balance = venue.positions().running_balance();
    summary.feed_warnings = strategy.feed_warnings();
    summary.rejected_entries = rejected_entries;

    info!(
        "Replay complete: {} days, {} entries, net ${:.2}",
        summary.trading_days, summary.entries, summary.net_pnl
    );

    Ok(ReplayReport { summary, trades })
}

fn apply_intents(venue: &mut PaperVenue, intents: &[OrderIntent], bar: &Bar) {
    for intent in intents {
        venue.submit(intent, bar);
    }
}

pub fn print_summary(summary: &ReplaySummary) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("              IB BREAKOUT REPLAY RESULTS                    ");
    println!("═══════════════════════════════════════════════════════════\n");

    println!("Primary Bars:      {}", summary.primary_bars);
    println!("IB-Source Bars:    {}", summary.ib_source_bars);
    println!("Trading Days:      {}", summary.trading_days);
    println!();
    println!("Entries:           {}", summary.entries);
    println!("Exits:             {}", summary.exits);
    println!("Wins:              {} ({:.1}%)", summary.wins, summary.win_rate);
    println!("Losses:            {}", summary.losses);
    println!("Profit Factor:     {:.2}", summary.profit_factor);
    println!();
    println!("Net P&L:           ${:+.2}", summary.net_pnl);
    println!("Final Balance:     ${:.2}", summary.final_balance);
    println!("Max Drawdown:      ${:.2}", summary.max_drawdown);

    if summary.feed_warnings > 0 || summary.rejected_entries > 0 {
        println!();
        println!("─── Anomalies ───");
        println!("Feed Warnings:     {}", summary.feed_warnings);
        println!("Rejected Entries:  {}", summary.rejected_entries);
    }

    println!("\n═══════════════════════════════════════════════════════════\n");
}

pub fn write_trades_csv(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    info!("Wrote {} trades to {:?}", trades.len(), path);
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &ReplaySummary) -> Result<()> {
    let file =
        std::fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(file, summary)?;
    info!("Wrote summary to {:?}", path);
    Ok(())
}
