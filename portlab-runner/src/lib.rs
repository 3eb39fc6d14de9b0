//! PortLab Runner: run orchestration on top of `portlab-core`.
//!
//! This crate provides:
//! - TOML run configuration with content-addressed run ids
//! - Price loading from wide Parquet/CSV files, or synthetic random walks
//! - Single portfolio and signal runs with metrics
//! - Parallel parameter sweeps (crossover windows, rebalance frequencies)
//! - CSV and JSON export of weights, equity curves, trades and sweeps

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use config::{ConfigError, DataConfig, RunConfig, RunId};
pub use data_loader::{load_table, read_prices, synthetic_table, write_prices, LoadError};
pub use export::{save_backtest_artifacts, save_portfolio_artifacts};
pub use runner::{run_backtest, run_portfolio, OutcomeCounts, PortfolioRun, RunError, SignalRun};
pub use sweep::{sweep_frequencies, sweep_signals, RankBy, SignalGrid, SweepResults, SweepRow};
