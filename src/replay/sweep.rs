//! Parameter Sweep Module
//!
//! Runs parallel parameter sweeps using Rayon. Bars are loaded once and
//! shared read-only across every combination.

use anyhow::Result;
use rayon::prelude::*;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

use super::runner::{run_replay, ReplayData, ReplaySummary};
use crate::trading_core::StrategyConfig;

/// Parameter configuration for sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepParams {
    pub ib_period_minutes: u32,
    pub tp3_multiplier: f64,
    pub breakout_by_close: bool,
}

impl SweepParams {
    fn apply(&self, base: &StrategyConfig) -> StrategyConfig {
        StrategyConfig {
            ib_period_minutes: self.ib_period_minutes,
            tp3_multiplier: self.tp3_multiplier,
            breakout_by_close: self.breakout_by_close,
            ..base.clone()
        }
    }
}

/// Results from a single backtest run
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub params: SweepParams,
    pub summary: ReplaySummary,
}

/// Generate all parameter combinations
pub fn generate_combinations(
    ib_period_values: &[u32],
    tp3_multiplier_values: &[f64],
    breakout_by_close_values: &[bool],
) -> Vec<SweepParams> {
    let mut combinations = Vec::new();

    for &ib_period_minutes in ib_period_values {
        for &tp3_multiplier in tp3_multiplier_values {
            for &breakout_by_close in breakout_by_close_values {
                combinations.push(SweepParams {
                    ib_period_minutes,
                    tp3_multiplier,
                    breakout_by_close,
                });
            }
        }
    }

    combinations
}

/// Run parameter sweep in parallel, best net P&L first
///
/// Combinations that fail validation or replay are logged and dropped.
pub fn run_sweep(
    base: &StrategyConfig,
    data: &ReplayData,
    starting_balance: f64,
    combinations: Vec<SweepParams>,
) -> Vec<SweepResult> {
    let total = combinations.len();
    println!("\nRunning {} parameter combinations in parallel...", total);

    let completed = AtomicUsize::new(0);
    let start = std::time::Instant::now();

    let mut results: Vec<SweepResult> = combinations
        .into_par_iter()
        .filter_map(|params| {
            let outcome = run_replay(params.apply(base), data, starting_balance);

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 10 == 0 || done == total {
                let elapsed = start.elapsed().as_secs_f64();
                let rate = done as f64 / elapsed;
                let eta = (total - done) as f64 / rate;
                eprint!("\r[{}/{}] {:.1}/s, ETA: {:.0}s       ", done, total, rate, eta);
            }

            match outcome {
                Ok(report) => Some(SweepResult {
                    params,
                    summary: report.summary,
                }),
                Err(e) => {
                    warn!("Skipping {:?}: {:#}", params, e);
                    None
                }
            }
        })
        .collect();

    eprintln!();

    results.sort_by(|a, b| b.summary.net_pnl.total_cmp(&a.summary.net_pnl));
    results
}

pub fn write_sweep_csv(path: &Path, results: &[SweepResult]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    writeln!(
        file,
        "ib_period_minutes,tp3_multiplier,breakout_by_close,entries,exits,wins,losses,win_rate,profit_factor,net_pnl,max_drawdown"
    )?;

    for result in results {
        let p = &result.params;
        let s = &result.summary;
        writeln!(
            file,
            "{},{},{},{},{},{},{},{:.2},{:.2},{:.2},{:.2}",
            p.ib_period_minutes,
            p.tp3_multiplier,
            p.breakout_by_close,
            s.entries,
            s.exits,
            s.wins,
            s.losses,
            s.win_rate,
            s.profit_factor,
            s.net_pnl,
            s.max_drawdown
        )?;
    }

    println!("\nResults written to {:?}", path);
    Ok(())
}

pub fn print_top(results: &[SweepResult], count: usize) {
    println!("\n=== SWEEP SUMMARY ===");
    println!("Completed combinations: {}", results.len());

    println!("\nTop {} by net P&L:", count.min(results.len()));
    for (i, r) in results.iter().take(count).enumerate() {
        let p = &r.params;
        let s = &r.summary;
        println!(
            "  {}. P&L=${:+.2} PF={:.2} Entries={} WR={:.1}% DD=${:.2}",
            i + 1,
            s.net_pnl,
            s.profit_factor,
            s.entries,
            s.win_rate,
            s.max_drawdown
        );
        println!(
            "     ib={}m tp3={}x by_close={}",
            p.ib_period_minutes, p.tp3_multiplier, p.breakout_by_close
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading_core::Bar;
    use chrono::{DateTime, TimeZone, Utc};

    fn et(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, h + 5, m, 0).unwrap()
    }

    #[test]
    fn test_generate_combinations() {
        let combos = generate_combinations(&[30, 60], &[1.5, 2.0, 3.0], &[true, false]);
        assert_eq!(combos.len(), 12);
        assert_eq!(
            combos[0],
            SweepParams {
                ib_period_minutes: 30,
                tp3_multiplier: 1.5,
                breakout_by_close: true
            }
        );
    }

    #[test]
    fn test_sweep_ranks_and_drops_invalid() {
        let base = StrategyConfig {
            bars_required_to_trade: 0,
            use_opening_candle_filter: false,
            risk_percent: 0.0,
            ..Default::default()
        };
        let data = ReplayData {
            primary: vec![
                Bar::new(et(10, 31), 107.0, 109.5, 106.5, 109.0),
                Bar::new(et(10, 32), 109.0, 121.5, 108.5, 121.0),
                Bar::new(et(15, 59), 116.0, 116.5, 114.5, 115.0),
                Bar::new(et(16, 0), 115.0, 115.5, 114.5, 115.0),
            ],
            primary_minutes: 1,
            ib_source: vec![
                Bar::new(et(9, 30), 101.0, 105.0, 100.0, 104.0),
                Bar::new(et(10, 0), 104.0, 108.0, 102.0, 107.0),
            ],
        };

        // tp3 = 20 is outside the valid range and is dropped
        let combos = generate_combinations(&[60], &[1.5, 2.0, 20.0], &[true]);
        let results = run_sweep(&base, &data, 50_000.0, combos);
        assert_eq!(results.len(), 2);
        // 1.5x target (121) is reached; 2.0x (125) is not and goes flat at session end
        assert_eq!(results[0].params.tp3_multiplier, 1.5);
        assert_eq!(results[0].summary.net_pnl, 12.0 * 4.0 * 5.0);
        assert_eq!(results[1].summary.net_pnl, 6.0 * 4.0 * 5.0);
    }
}
