//! Historical replay of the strategy against the paper venue

pub mod loader;
pub mod runner;
pub mod sweep;

pub use loader::{load_bars, read_bars};
pub use runner::{
    merge_streams, print_summary, run_replay, write_summary_json, write_trades_csv, ReplayData,
    ReplayReport, ReplaySummary, StreamBar,
};
pub use sweep::{
    generate_combinations, print_top, run_sweep, write_sweep_csv, SweepParams, SweepResult,
};
