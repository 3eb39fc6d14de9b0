//! Run orchestration: wires loaded prices through the core engines.
//!
//! Two entry points, both free of I/O:
//! - `run_portfolio()`: rolling optimization over the whole table, then a
//!   weight replay so the allocation gets an equity curve.
//! - `run_backtest()`: crossover signal on one instrument, then simulation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use portlab_core::backtest::{replay_weights, BacktestResult, BacktestSimulator, ReplayResult};
use portlab_core::domain::{PriceTable, RebalanceOutcome, SignalReading, WeightTimeSeries};
use portlab_core::error::{BacktestError, ConfigError as EngineConfigError, DataError};
use portlab_core::scheduler::RebalanceScheduler;
use portlab_core::signals::CrossoverSignal;

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{dataset_hash, load_table, LoadError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine config error: {0}")]
    Engine(#[from] EngineConfigError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Counts of each rebalance outcome in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub optimized: usize,
    pub infeasible: usize,
    pub timed_out: usize,
    pub insufficient_data: usize,
}

impl OutcomeCounts {
    pub fn tally(series: &WeightTimeSeries) -> Self {
        let mut counts = Self::default();
        for entry in series.entries() {
            match entry.outcome {
                RebalanceOutcome::Optimized => counts.optimized += 1,
                RebalanceOutcome::Infeasible => counts.infeasible += 1,
                RebalanceOutcome::TimedOut => counts.timed_out += 1,
                RebalanceOutcome::InsufficientData => counts.insufficient_data += 1,
            }
        }
        counts
    }
}

/// Complete result of one rolling-optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRun {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub dataset_hash: String,
    pub instruments: Vec<String>,
    pub weights: WeightTimeSeries,
    pub outcomes: OutcomeCounts,
    pub replay: ReplayResult,
}

/// Complete result of one signal backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRun {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub dataset_hash: String,
    pub signal: String,
    pub entries: usize,
    pub exits: usize,
    pub warmup: usize,
    pub result: BacktestResult,
}

/// Load the configured prices.
pub fn load(config: &RunConfig) -> Result<PriceTable, RunError> {
    config.validate()?;
    Ok(load_table(&config.data)?)
}

/// Rolling optimization over every instrument in `table`, replayed with the
/// configured fee and starting cash.
pub fn run_portfolio(config: &RunConfig, table: &PriceTable) -> Result<PortfolioRun, RunError> {
    let scheduler = RebalanceScheduler::new(config.portfolio.clone())?;
    let weights = scheduler.run(table);
    let replay = replay_weights(
        table,
        &weights,
        config.backtest.fee_bps,
        config.backtest.initial_cash,
    )?;
    let outcomes = OutcomeCounts::tally(&weights);
    info!(
        rebalances = weights.len(),
        optimized = outcomes.optimized,
        sharpe = replay.metrics.sharpe,
        "portfolio run complete"
    );
    Ok(PortfolioRun {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        dataset_hash: dataset_hash(table),
        instruments: table.instruments().map(str::to_string).collect(),
        weights,
        outcomes,
        replay,
    })
}

/// Crossover backtest on one instrument. Missing prices are dropped (gaps).
pub fn run_backtest(
    config: &RunConfig,
    table: &PriceTable,
    instrument: &str,
) -> Result<SignalRun, RunError> {
    let series = table.series(instrument)?;
    let signal = CrossoverSignal::from_config(&config.signal)?;
    let simulator = BacktestSimulator::new(config.backtest)?;

    let readings = signal.generate(&series);
    let result = simulator.run_signal(&series, &readings)?;
    info!(
        instrument,
        signal = %signal.name(),
        trades = result.trades.len(),
        final_equity = result.final_equity(),
        "backtest complete"
    );
    Ok(SignalRun {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        dataset_hash: dataset_hash(table),
        signal: signal.name(),
        entries: readings.count(SignalReading::Entry),
        exits: readings.count(SignalReading::Exit),
        warmup: signal.warmup(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::synthetic_table;
    use chrono::NaiveDate;

    fn config() -> RunConfig {
        let mut config = RunConfig::default();
        config.data.synthetic = vec!["AAA".into(), "BBB".into(), "CCC".into()];
        config.data.start = NaiveDate::from_ymd_opt(2019, 1, 1);
        config.data.end = NaiveDate::from_ymd_opt(2021, 12, 31);
        config.portfolio.min_history_days = 126;
        config.signal.fast_window = 10;
        config.signal.slow_window = 30;
        config
    }

    fn table(config: &RunConfig) -> PriceTable {
        synthetic_table(
            &config.data.synthetic,
            config.data.start.unwrap(),
            config.data.end.unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn portfolio_run_counts_every_entry() {
        let cfg = config();
        let run = run_portfolio(&cfg, &table(&cfg)).unwrap();
        let c = run.outcomes;
        assert_eq!(
            c.optimized + c.infeasible + c.timed_out + c.insufficient_data,
            run.weights.len()
        );
        assert_eq!(run.instruments, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(run.replay.equity_curve.len(), table(&cfg).len());
    }

    #[test]
    fn backtest_run_reports_signal_counts() {
        let cfg = config();
        let run = run_backtest(&cfg, &table(&cfg), "BBB").unwrap();
        assert_eq!(run.signal, "sma_10_x_sma_30");
        assert_eq!(run.warmup, 30);
        assert!(run.entries >= run.result.trades.len());
    }

    #[test]
    fn unknown_instrument_is_an_error() {
        let cfg = config();
        let err = run_backtest(&cfg, &table(&cfg), "ZZZ").unwrap_err();
        assert!(matches!(err, RunError::Data(DataError::UnknownInstrument(_))));
    }
}
