//! Rolling rebalance driver.
//!
//! Walks the eligible windows of a table in time order and turns each into
//! one [`RebalanceEntry`] through a pure per-window function. A window that
//! cannot be estimated or optimized records the all-zero fallback and the run
//! moves on; warm-up windows record nothing.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{ConfigError, PortfolioConfig};
use crate::domain::{PriceTable, RebalanceEntry, RebalanceOutcome, WeightTimeSeries, WeightVector};
use crate::estimation::{CovarianceEstimator, Estimate, EstimationError};
use crate::optimizer::{MeanVarianceOptimizer, OptimizeError, PortfolioSolver};
use crate::windowing::{PriceWindowing, Window};

/// Drives windowing, estimation and optimization across a whole table.
#[derive(Debug, Clone)]
pub struct RebalanceScheduler {
    config: PortfolioConfig,
    optimizer: MeanVarianceOptimizer,
}

impl RebalanceScheduler {
    pub fn new(config: PortfolioConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let optimizer = MeanVarianceOptimizer::new(config.constraints())
            .with_weight_cutoff(config.weight_cutoff);
        Ok(Self { config, optimizer })
    }

    /// Replace the numerical solver.
    pub fn with_solver(mut self, solver: Arc<dyn PortfolioSolver>) -> Self {
        self.optimizer = self.optimizer.with_solver(solver);
        self
    }

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    pub fn windowing(&self) -> PriceWindowing {
        PriceWindowing::new(
            self.config.rebalance_frequency,
            self.config.estimation_window,
            self.config.min_history_days,
        )
    }

    /// Run every eligible window in time order.
    pub fn run(&self, table: &PriceTable) -> WeightTimeSeries {
        let mut series = WeightTimeSeries::new();
        for window in self.windowing().windows(table) {
            series.push(rebalance_window(&window, &self.config, &self.optimizer));
        }
        info!(
            rebalances = series.len(),
            frequency = %self.config.rebalance_frequency,
            instruments = table.instrument_count(),
            "rebalance run complete"
        );
        series
    }
}

/// Decide the allocation for one window.
///
/// Reads nothing outside the window's rows; the entry is dated at the
/// window's exclusive end.
pub fn rebalance_window(
    window: &Window<'_>,
    config: &PortfolioConfig,
    optimizer: &MeanVarianceOptimizer,
) -> RebalanceEntry {
    let timestamp = window.rebalance_date();
    let universe: Vec<&str> = window.instruments().collect();

    let estimator = CovarianceEstimator::new(config.shrinkage_target)
        .with_expected_returns(config.expected_returns)
        .with_periods_per_year(config.trading_days_per_year);

    let estimate = match estimator.estimate(window) {
        Ok(estimate) => estimate,
        Err(err) => {
            debug!(rebalance = %timestamp, error = %err, "estimation failed; holding cash");
            let excluded = match err {
                EstimationError::NoUsableInstruments { .. } => {
                    universe.iter().map(|s| s.to_string()).collect()
                }
                EstimationError::InsufficientData { .. } => Vec::new(),
            };
            return RebalanceEntry {
                timestamp,
                weights: WeightVector::zero(universe.iter().copied()),
                outcome: RebalanceOutcome::InsufficientData,
                excluded,
                shrinkage: None,
            };
        }
    };

    let excluded: Vec<String> = estimate
        .excluded
        .iter()
        .map(|e| e.instrument.clone())
        .collect();
    let shrinkage = Some(estimate.shrinkage);

    let timeout = config.solver_timeout_ms.map(Duration::from_millis);
    let solved = match timeout {
        Some(limit) => solve_with_timeout(optimizer, estimate.clone(), limit),
        None => optimizer.solve(&estimate),
    };

    let result = solved.and_then(|weights| {
        optimizer.to_weight_vector(&estimate, &weights, universe.iter().copied())
    });

    let (weights, outcome) = match result {
        Ok(weights) => (weights, RebalanceOutcome::Optimized),
        Err(OptimizeError::SolverTimeout(limit)) => {
            warn!(
                rebalance = %timestamp,
                timeout_ms = limit.as_millis() as u64,
                "solver timed out; holding cash"
            );
            (
                WeightVector::zero(universe.iter().copied()),
                RebalanceOutcome::TimedOut,
            )
        }
        Err(err) => {
            debug!(rebalance = %timestamp, error = %err, "no feasible allocation; holding cash");
            (
                WeightVector::zero(universe.iter().copied()),
                RebalanceOutcome::Infeasible,
            )
        }
    };

    RebalanceEntry {
        timestamp,
        weights,
        outcome,
        excluded,
        shrinkage,
    }
}

/// Solve on a detached worker and stop waiting after `limit`.
///
/// The solve itself cannot be cancelled; a late result is dropped when the
/// worker finishes.
fn solve_with_timeout(
    optimizer: &MeanVarianceOptimizer,
    estimate: Estimate,
    limit: Duration,
) -> Result<Vec<f64>, OptimizeError> {
    let (tx, rx) = mpsc::channel();
    let worker = optimizer.clone();
    thread::Builder::new()
        .name("portlab-solve".into())
        .spawn(move || {
            let _ = tx.send(worker.solve(&estimate));
        })
        .map_err(|e| OptimizeError::Infeasible(format!("could not start solver thread: {e}")))?;

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(OptimizeError::SolverTimeout(limit)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(OptimizeError::Infeasible("solver thread exited without a result".into()))
        }
    }
}
