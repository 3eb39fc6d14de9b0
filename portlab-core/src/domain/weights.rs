//! Portfolio weights and their time series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::InstrumentId;

/// Tolerance for the sum-to-one invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    #[error("weight for '{instrument}' is {weight}; long-only weights must be >= 0")]
    Negative { instrument: String, weight: f64 },

    #[error("weight for '{instrument}' is not finite")]
    NonFinite { instrument: String },

    #[error("weights sum to {sum}; expected 1.0 or an all-zero allocation")]
    BadSum { sum: f64 },
}

/// Allocation across the full instrument universe of a table.
///
/// Invariant: either every weight is zero ("no allocation", sit in cash) or the
/// weights sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`]. Long-only vectors have no
/// negative entries. A partially filled vector cannot be constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    weights: BTreeMap<InstrumentId, f64>,
}

impl WeightVector {
    /// Validate and wrap a long-only allocation.
    pub fn long_only(weights: BTreeMap<InstrumentId, f64>) -> Result<Self, WeightError> {
        for (instrument, &w) in &weights {
            if w < 0.0 {
                return Err(WeightError::Negative {
                    instrument: instrument.clone(),
                    weight: w,
                });
            }
        }
        Self::with_shorts(weights)
    }

    /// Validate an allocation that may hold negative (short) weights.
    pub fn with_shorts(weights: BTreeMap<InstrumentId, f64>) -> Result<Self, WeightError> {
        for (instrument, w) in &weights {
            if !w.is_finite() {
                return Err(WeightError::NonFinite {
                    instrument: instrument.clone(),
                });
            }
        }
        let all_zero = weights.values().all(|w| *w == 0.0);
        let sum: f64 = weights.values().sum();
        if !all_zero && (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightError::BadSum { sum });
        }
        Ok(Self { weights })
    }

    /// The explicit "no allocation" state over the given universe.
    pub fn zero<'a>(instruments: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            weights: instruments
                .into_iter()
                .map(|i| (i.to_string(), 0.0))
                .collect(),
        }
    }

    pub fn get(&self, instrument: &str) -> f64 {
        self.weights.get(instrument).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<InstrumentId, f64> {
        &self.weights
    }

    pub fn is_zero(&self) -> bool {
        self.weights.values().all(|w| *w == 0.0)
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Instruments holding a non-zero weight.
    pub fn holdings(&self) -> Vec<&str> {
        self.weights
            .iter()
            .filter(|(_, w)| **w != 0.0)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Why a rebalance entry holds the weights it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceOutcome {
    /// Solver converged; weights are cleaned and sum to one.
    Optimized,
    /// No feasible allocation; all-zero fallback.
    Infeasible,
    /// Solver exceeded the per-window timeout; all-zero fallback.
    TimedOut,
    /// Estimation could not run on this window; all-zero fallback.
    InsufficientData,
}

/// One rebalance decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceEntry {
    /// Decision timestamp. Only prices dated strictly before it were used.
    pub timestamp: NaiveDate,
    pub weights: WeightVector,
    pub outcome: RebalanceOutcome,
    /// Instruments dropped from estimation for this window.
    pub excluded: Vec<InstrumentId>,
    /// Shrinkage intensity used by the covariance estimate, when one was built.
    pub shrinkage: Option<f64>,
}

/// Rebalance decisions ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightTimeSeries {
    entries: Vec<RebalanceEntry>,
}

impl WeightTimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Timestamps must be strictly increasing.
    pub(crate) fn push(&mut self, entry: RebalanceEntry) {
        debug_assert!(self
            .entries
            .last()
            .map_or(true, |last| last.timestamp < entry.timestamp));
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RebalanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDate> {
        self.entries.iter().map(|e| e.timestamp).collect()
    }

    /// Entry in force on `date`: the latest entry with `timestamp <= date`.
    pub fn active_on(&self, date: NaiveDate) -> Option<&RebalanceEntry> {
        let idx = self.entries.partition_point(|e| e.timestamp <= date);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Explicit "hold previous allocation" expansion onto a date axis.
    ///
    /// Dates before the first entry map to `None`.
    pub fn hold_forward(&self, dates: &[NaiveDate]) -> Vec<Option<&WeightVector>> {
        dates
            .iter()
            .map(|d| self.active_on(*d).map(|e| &e.weights))
            .collect()
    }

    /// Rectangular view: one row per entry, one column per instrument.
    pub fn to_frame(&self) -> (Vec<NaiveDate>, BTreeMap<InstrumentId, Vec<f64>>) {
        let mut columns: BTreeMap<InstrumentId, Vec<f64>> = BTreeMap::new();
        for entry in &self.entries {
            for (instrument, _) in entry.weights.iter() {
                columns.entry(instrument.to_string()).or_default();
            }
        }
        for entry in &self.entries {
            for (instrument, column) in columns.iter_mut() {
                column.push(entry.weights.get(instrument));
            }
        }
        (self.timestamps(), columns)
    }
}
