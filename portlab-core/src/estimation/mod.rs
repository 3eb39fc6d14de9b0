//! Covariance and expected-return estimation for a single rebalance window.
//!
//! Only instruments with a complete, positive price history inside the window
//! and non-zero return variance take part. Everything else is reported in
//! [`Estimate::excluded`] and receives zero weight downstream.

pub mod returns;
pub mod shrinkage;

pub use returns::{simple_returns, ExpectedReturnModel};
pub use shrinkage::{ledoit_wolf, ShrinkageTarget, Shrunk};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::InstrumentId;
use crate::linalg::CovMatrix;
use crate::windowing::Window;

/// Variance below this (per period) is treated as a constant price.
const MIN_VARIANCE: f64 = 1e-14;

/// Minimum return observations for a covariance estimate.
pub const MIN_OBSERVATIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    #[error("insufficient data: {observations} return observations, need at least {required}")]
    InsufficientData { observations: usize, required: usize },

    #[error("insufficient data: no instrument is usable in the window ({excluded} excluded)")]
    NoUsableInstruments { excluded: usize },
}

/// Why an instrument was left out of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// At least one missing or non-positive price in the window.
    MissingPrices,
    /// Returns have (numerically) zero variance.
    ZeroVariance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub instrument: InstrumentId,
    pub reason: ExclusionReason,
}

/// Annualised inputs to the optimizer. Vectors are aligned with `instruments`.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub instruments: Vec<InstrumentId>,
    pub expected_returns: Vec<f64>,
    pub covariance: CovMatrix,
    pub shrinkage: f64,
    pub target: ShrinkageTarget,
    pub excluded: Vec<Exclusion>,
    /// Return observations used.
    pub observations: usize,
}

impl Estimate {
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

/// Shrinkage covariance estimator with a configurable target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovarianceEstimator {
    pub target: ShrinkageTarget,
    pub expected_returns: ExpectedReturnModel,
    /// Periods per year used to annualise (252 for daily bars).
    pub periods_per_year: f64,
}

impl Default for CovarianceEstimator {
    fn default() -> Self {
        Self {
            target: ShrinkageTarget::default(),
            expected_returns: ExpectedReturnModel::default(),
            periods_per_year: 252.0,
        }
    }
}

impl CovarianceEstimator {
    pub fn new(target: ShrinkageTarget) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    pub fn with_expected_returns(mut self, model: ExpectedReturnModel) -> Self {
        self.expected_returns = model;
        self
    }

    pub fn with_periods_per_year(mut self, periods: f64) -> Self {
        self.periods_per_year = periods;
        self
    }

    /// Estimate from every instrument in a window.
    pub fn estimate(&self, window: &Window<'_>) -> Result<Estimate, EstimationError> {
        let columns: Vec<(&str, &[f64])> = window
            .instruments()
            .filter_map(|id| window.column(id).map(|c| (id, c)))
            .collect();
        self.estimate_columns(&columns)
    }

    /// Estimate from named price columns of equal length.
    pub fn estimate_columns(
        &self,
        columns: &[(&str, &[f64])],
    ) -> Result<Estimate, EstimationError> {
        let rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let observations = rows.saturating_sub(1);
        if observations < MIN_OBSERVATIONS {
            return Err(EstimationError::InsufficientData {
                observations,
                required: MIN_OBSERVATIONS,
            });
        }

        let mut instruments = Vec::new();
        let mut series = Vec::new();
        let mut excluded = Vec::new();
        for (id, prices) in columns {
            if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
                excluded.push(Exclusion {
                    instrument: id.to_string(),
                    reason: ExclusionReason::MissingPrices,
                });
                continue;
            }
            let r = simple_returns(prices);
            if returns::sample_variance(&r) < MIN_VARIANCE {
                excluded.push(Exclusion {
                    instrument: id.to_string(),
                    reason: ExclusionReason::ZeroVariance,
                });
                continue;
            }
            instruments.push(id.to_string());
            series.push(r);
        }

        for e in &excluded {
            debug!(instrument = %e.instrument, reason = ?e.reason, "excluded from estimate");
        }
        if instruments.is_empty() {
            return Err(EstimationError::NoUsableInstruments {
                excluded: excluded.len(),
            });
        }

        let expected_returns = series
            .iter()
            .map(|r| self.expected_returns.annualize(r, self.periods_per_year))
            .collect();

        let shrunk = ledoit_wolf(&series, self.target);
        let covariance = shrunk.covariance * self.periods_per_year;

        debug!(
            instruments = instruments.len(),
            observations,
            shrinkage = shrunk.intensity,
            target = %shrunk.target,
            "covariance estimated"
        );

        Ok(Estimate {
            instruments,
            expected_returns,
            covariance,
            shrinkage: shrunk.intensity,
            target: shrunk.target,
            excluded,
            observations,
        })
    }
}
