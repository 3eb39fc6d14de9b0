//! PortLab Core: rolling portfolio optimization and signal backtesting engines.
//!
//! This crate contains the numerical heart of PortLab:
//! - Domain types (price series and tables, weight vectors, signal events)
//! - Calendar windowing of a price table into rebalance periods
//! - Shrinkage covariance estimation toward a structured target
//! - Long-only / long-short maximum-Sharpe optimization behind a solver trait
//! - A rebalance scheduler that turns windows into a weight time series
//! - Moving-average crossover signals and a Flat/Long backtest simulator
//!
//! Nothing here performs I/O beyond the columnar (`polars`) conversion in
//! [`data::frame`]. Loading, sweeping and export live in `portlab-runner`.

pub mod backtest;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod estimation;
pub mod indicators;
pub mod linalg;
pub mod metrics;
pub mod optimizer;
pub mod scheduler;
pub mod signals;
pub mod windowing;

pub use backtest::{BacktestError, BacktestResult, BacktestSimulator, MalformedInput};
pub use config::{BacktestConfig, ConfigError, PortfolioConfig, SignalConfig, Sizing};
pub use domain::{PriceSeries, PriceTable, SignalEvent, WeightTimeSeries, WeightVector};
pub use estimation::{CovarianceEstimator, ShrinkageTarget};
pub use optimizer::{MeanVarianceOptimizer, OptimizeError, PortfolioSolver};
pub use scheduler::RebalanceScheduler;
pub use signals::CrossoverSignal;
pub use windowing::{PriceWindowing, RebalanceFrequency};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine inputs and outputs can cross thread
    /// boundaries. Sweeps in the runner fan these out over rayon.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::PriceTable>();
        require_sync::<domain::PriceTable>();
        require_send::<domain::WeightVector>();
        require_sync::<domain::WeightVector>();
        require_send::<domain::WeightTimeSeries>();
        require_sync::<domain::WeightTimeSeries>();
        require_send::<domain::SignalEvent>();
        require_sync::<domain::SignalEvent>();

        // Engines
        require_send::<estimation::CovarianceEstimator>();
        require_sync::<estimation::CovarianceEstimator>();
        require_send::<estimation::Estimate>();
        require_sync::<estimation::Estimate>();
        require_send::<optimizer::MeanVarianceOptimizer>();
        require_sync::<optimizer::MeanVarianceOptimizer>();
        require_send::<scheduler::RebalanceScheduler>();
        require_sync::<scheduler::RebalanceScheduler>();
        require_send::<signals::CrossoverSignal>();
        require_sync::<signals::CrossoverSignal>();
        require_send::<backtest::BacktestSimulator>();
        require_sync::<backtest::BacktestSimulator>();

        // Results
        require_send::<backtest::BacktestResult>();
        require_sync::<backtest::BacktestResult>();
        require_send::<backtest::ReplayResult>();
        require_sync::<backtest::ReplayResult>();
        require_send::<metrics::PerformanceMetrics>();
        require_sync::<metrics::PerformanceMetrics>();
    }

    /// Architecture contract: a solver only sees estimated inputs.
    ///
    /// `solve()` takes expected returns, a covariance matrix and constraints.
    /// It has no access to prices or dates, so it cannot look past the window.
    #[test]
    fn solver_trait_sees_no_price_data() {
        fn _check_trait_object_builds(
            solver: &dyn optimizer::PortfolioSolver,
            mu: &[f64],
            cov: &linalg::CovMatrix,
            constraints: &optimizer::Constraints,
        ) -> Result<Vec<f64>, OptimizeError> {
            solver.solve(mu, cov, constraints)
        }
    }
}
