use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ib_breakout::replay::{self, ReplayData};
use ib_breakout::{IbBreakoutStrategy, StrategyConfig};

#[derive(Parser, Debug)]
#[command(name = "ib-breakout")]
#[command(about = "Initial Balance breakout strategy replay and parameter sweeps")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Inputs shared by replay and sweep
#[derive(ClapArgs, Debug)]
struct DataArgs {
    /// Primary bar file (CSV, optionally .zst)
    #[arg(short, long)]
    primary: PathBuf,

    /// Primary bar period in minutes
    #[arg(long, default_value = "1")]
    primary_minutes: u32,

    /// IB-source bar file (CSV, optionally .zst)
    #[arg(short, long)]
    ib_source: PathBuf,

    /// Strategy config JSON; defaults apply when omitted
    #[arg(short, long, env = "IB_BREAKOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Starting account balance
    #[arg(long, default_value = "50000.0")]
    starting_balance: f64,

    /// Override the configured risk % per trade (0 = fixed lot)
    #[arg(long)]
    risk_percent: Option<f64>,

    /// Override the configured IB period in minutes
    #[arg(long)]
    ib_period: Option<u32>,

    /// Disable the opening candle direction filter
    #[arg(long)]
    no_opening_filter: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay historical bars through the strategy and a paper venue
    Replay {
        #[command(flatten)]
        data: DataArgs,

        /// Write the trade log as CSV
        #[arg(long)]
        trades_out: Option<PathBuf>,

        /// Write the summary as JSON
        #[arg(long)]
        summary_out: Option<PathBuf>,
    },

    /// Sweep IB period, final target and breakout mode in parallel
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// IB periods to test (minutes, comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "30,60,90")]
        ib_periods: Vec<u32>,

        /// Final target multipliers to test (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "1.0,1.5,2.0,3.0")]
        tp3: Vec<f64>,

        /// Output CSV
        #[arg(short, long, default_value = "sweep_results.csv")]
        output: PathBuf,

        /// Number of top results to print
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Validate a strategy config and print the effective values
    CheckConfig {
        /// Strategy config JSON
        #[arg(short, long, env = "IB_BREAKOUT_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Commands::Replay {
            data,
            trades_out,
            summary_out,
        } => {
            let config = resolve_config(&data)?;
            let bars = load_data(&data)?;
            let report = replay::run_replay(config, &bars, data.starting_balance)?;

            replay::print_summary(&report.summary);
            if let Some(path) = trades_out {
                replay::write_trades_csv(&path, &report.trades)?;
            }
            if let Some(path) = summary_out {
                replay::write_summary_json(&path, &report.summary)?;
            }
        }
        Commands::Sweep {
            data,
            ib_periods,
            tp3,
            output,
            top,
        } => {
            let config = resolve_config(&data)?;

            let start = std::time::Instant::now();
            let bars = load_data(&data)?;
            println!(
                "Loaded {} primary / {} IB-source bars in {:.1}s",
                bars.primary.len(),
                bars.ib_source.len(),
                start.elapsed().as_secs_f64()
            );

            let combinations = replay::generate_combinations(&ib_periods, &tp3, &[true, false]);
            let total = combinations.len();
            let results = replay::run_sweep(&config, &bars, data.starting_balance, combinations);

            replay::write_sweep_csv(&output, &results)?;
            replay::print_top(&results, top);

            let elapsed = start.elapsed();
            println!(
                "\nCompleted {} runs in {:.1}s ({:.1} tests/second)",
                total,
                elapsed.as_secs_f64(),
                total as f64 / elapsed.as_secs_f64()
            );
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config.as_deref())?;
            let strategy = IbBreakoutStrategy::new(config).context("Invalid strategy config")?;
            println!("{}", serde_json::to_string_pretty(strategy.config())?);
            info!("Config OK");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<StrategyConfig> {
    let Some(path) = path else {
        return Ok(StrategyConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {:?}", path))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config: {:?}", path))?;
    info!("Loaded config from {:?}", path);
    Ok(config)
}

fn resolve_config(data: &DataArgs) -> Result<StrategyConfig> {
    let mut config = load_config(data.config.as_deref())?;
    if let Some(risk) = data.risk_percent {
        config.risk_percent = risk;
    }
    if let Some(period) = data.ib_period {
        config.ib_period_minutes = period;
    }
    if data.no_opening_filter {
        config.use_opening_candle_filter = false;
    }
    config.validate().context("Invalid strategy config")?;
    Ok(config)
}

fn load_data(data: &DataArgs) -> Result<ReplayData> {
    info!("Loading primary bars from {:?}", data.primary);
    let primary = replay::load_bars(&data.primary)?;
    info!("Loading IB-source bars from {:?}", data.ib_source);
    let ib_source = replay::load_bars(&data.ib_source)?;

    if primary.is_empty() {
        anyhow::bail!("No primary bars found in {:?}", data.primary);
    }

    Ok(ReplayData {
        primary,
        primary_minutes: data.primary_minutes,
        ib_source,
    })
}
