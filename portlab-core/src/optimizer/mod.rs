//! Mean-variance optimization for a single window.
//!
//! The numerical solve sits behind [`PortfolioSolver`]; the optimizer owns the
//! surrounding policy: input validation, weight cleaning and the mapping of
//! solver output back onto the full instrument universe.

pub mod clean;
pub mod max_sharpe;

pub use clean::{clean_weights, DEFAULT_WEIGHT_CUTOFF};
pub use max_sharpe::MaxSharpeSolver;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{WeightError, WeightVector};
use crate::estimation::Estimate;
use crate::linalg::{all_finite, CovMatrix};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("infeasible optimization: {0}")]
    Infeasible(String),

    #[error("solver timed out after {0:?}")]
    SolverTimeout(Duration),

    #[error("invalid optimizer input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Weights(#[from] WeightError),
}

/// Constraint set and objective parameters handed to a solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Permit negative weights. Weights still sum to one.
    pub allow_short: bool,
    /// Annual risk-free rate subtracted from expected returns.
    pub risk_free_rate: f64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            allow_short: false,
            risk_free_rate: 0.02,
        }
    }
}

/// Swappable numerical core.
///
/// Implementations return one raw weight per input instrument, summing to one.
/// Cleaning and universe mapping happen in [`MeanVarianceOptimizer`].
pub trait PortfolioSolver: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn solve(
        &self,
        expected_returns: &[f64],
        covariance: &CovMatrix,
        constraints: &Constraints,
    ) -> Result<Vec<f64>, OptimizeError>;
}

/// Max-Sharpe optimizer with clean-weights post-processing.
#[derive(Debug, Clone)]
pub struct MeanVarianceOptimizer {
    solver: Arc<dyn PortfolioSolver>,
    pub constraints: Constraints,
    pub weight_cutoff: f64,
}

impl Default for MeanVarianceOptimizer {
    fn default() -> Self {
        Self::new(Constraints::default())
    }
}

impl MeanVarianceOptimizer {
    pub fn new(constraints: Constraints) -> Self {
        Self {
            solver: Arc::new(MaxSharpeSolver),
            constraints,
            weight_cutoff: DEFAULT_WEIGHT_CUTOFF,
        }
    }

    pub fn with_solver(mut self, solver: Arc<dyn PortfolioSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_weight_cutoff(mut self, cutoff: f64) -> Self {
        self.weight_cutoff = cutoff;
        self
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Solve and clean. Weights align with `estimate.instruments`.
    pub fn solve(&self, estimate: &Estimate) -> Result<Vec<f64>, OptimizeError> {
        let n = estimate.len();
        if n == 0 {
            return Err(OptimizeError::Infeasible("no eligible instruments".into()));
        }
        let (rows, cols) = estimate.covariance.dim();
        if estimate.expected_returns.len() != n || rows != n || cols != n {
            return Err(OptimizeError::InvalidInput(format!(
                "{} instruments, {} expected returns, {}x{} covariance",
                n,
                estimate.expected_returns.len(),
                rows,
                cols
            )));
        }
        if estimate.expected_returns.iter().any(|v| !v.is_finite())
            || !all_finite(estimate.covariance.view())
        {
            return Err(OptimizeError::InvalidInput("non-finite estimate".into()));
        }

        let raw = self
            .solver
            .solve(&estimate.expected_returns, &estimate.covariance, &self.constraints)?;
        if raw.len() != n || raw.iter().any(|w| !w.is_finite()) {
            return Err(OptimizeError::InvalidInput(format!(
                "solver '{}' returned a malformed weight vector",
                self.solver.name()
            )));
        }

        let cleaned = clean_weights(&raw, self.weight_cutoff);
        if cleaned.iter().all(|w| *w == 0.0) {
            return Err(OptimizeError::Infeasible(
                "every weight fell below the cleaning cutoff".into(),
            ));
        }
        Ok(cleaned)
    }

    /// Map solved weights onto the full universe; instruments absent from
    /// the estimate get zero.
    pub fn to_weight_vector<'a>(
        &self,
        estimate: &Estimate,
        weights: &[f64],
        universe: impl IntoIterator<Item = &'a str>,
    ) -> Result<WeightVector, OptimizeError> {
        let mut map: BTreeMap<String, f64> =
            universe.into_iter().map(|id| (id.to_string(), 0.0)).collect();
        for (id, w) in estimate.instruments.iter().zip(weights) {
            map.insert(id.clone(), *w);
        }
        let vector = if self.constraints.allow_short {
            WeightVector::with_shorts(map)?
        } else {
            WeightVector::long_only(map)?
        };
        Ok(vector)
    }

    /// Solve, clean, and map onto the universe in one call.
    pub fn optimize<'a>(
        &self,
        estimate: &Estimate,
        universe: impl IntoIterator<Item = &'a str>,
    ) -> Result<WeightVector, OptimizeError> {
        let weights = self.solve(estimate)?;
        self.to_weight_vector(estimate, &weights, universe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::ShrinkageTarget;

    fn estimate(mu: Vec<f64>, rows: Vec<Vec<f64>>) -> Estimate {
        let n = mu.len();
        Estimate {
            instruments: (0..n).map(|i| format!("I{i}")).collect(),
            expected_returns: mu,
            covariance: crate::linalg::symmetric_from_rows(&rows).unwrap(),
            shrinkage: 0.0,
            target: ShrinkageTarget::Diagonal,
            excluded: Vec::new(),
            observations: 252,
        }
    }

    #[test]
    fn optimize_covers_full_universe() {
        let est = estimate(vec![0.10, 0.08], vec![vec![0.04, 0.0], vec![0.0, 0.02]]);
        let w = MeanVarianceOptimizer::default()
            .optimize(&est, ["I0", "I1", "MISSING"])
            .unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.get("MISSING"), 0.0);
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_estimate_is_infeasible() {
        let est = Estimate {
            instruments: Vec::new(),
            expected_returns: Vec::new(),
            covariance: CovMatrix::zeros((0, 0)),
            shrinkage: 0.0,
            target: ShrinkageTarget::Diagonal,
            excluded: Vec::new(),
            observations: 0,
        };
        assert!(matches!(
            MeanVarianceOptimizer::default().solve(&est),
            Err(OptimizeError::Infeasible(_))
        ));
    }

    #[derive(Debug)]
    struct EqualWeight;

    impl PortfolioSolver for EqualWeight {
        fn name(&self) -> &'static str {
            "equal_weight"
        }

        fn solve(
            &self,
            expected_returns: &[f64],
            _covariance: &CovMatrix,
            _constraints: &Constraints,
        ) -> Result<Vec<f64>, OptimizeError> {
            let n = expected_returns.len() as f64;
            Ok(vec![1.0 / n; expected_returns.len()])
        }
    }

    #[test]
    fn solver_is_swappable() {
        let est = estimate(
            vec![0.10, -0.5, 0.3],
            vec![
                vec![0.04, 0.0, 0.0],
                vec![0.0, 0.02, 0.0],
                vec![0.0, 0.0, 0.01],
            ],
        );
        let opt = MeanVarianceOptimizer::default().with_solver(Arc::new(EqualWeight));
        assert_eq!(opt.solver_name(), "equal_weight");
        let w = opt.solve(&est).unwrap();
        assert!(w.iter().all(|v| (v - 1.0 / 3.0).abs() < 1e-12));
    }
}
