//! Rolling aggregates over a single price column.
//!
//! Every aggregate implements [`RollingStat`]: a full series in, a same-length
//! series out, `NaN` during warm-up. Value `t` depends only on inputs `..=t`.

pub mod ema;
pub mod sma;

pub use ema::Ema;
pub use sma::Sma;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rolling statistic over a price series.
///
/// # Look-ahead contamination guard
/// No output at index t may depend on input t+1 or later. Every
/// implementation must pass the truncated-vs-full series test.
pub trait RollingStat: Send + Sync + fmt::Debug {
    /// Human-readable name (e.g. "sma_20").
    fn name(&self) -> &str;

    /// Samples before the first defined output.
    fn lookback(&self) -> usize;

    /// Compute over the whole series. Output has the input's length.
    fn compute(&self, values: &[f64]) -> Vec<f64>;
}

/// Moving-average family selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovingAverageKind {
    #[default]
    Sma,
    Ema,
}

impl MovingAverageKind {
    pub fn build(&self, period: usize) -> Box<dyn RollingStat> {
        match self {
            Self::Sma => Box::new(Sma::new(period)),
            Self::Ema => Box::new(Ema::new(period)),
        }
    }
}

impl fmt::Display for MovingAverageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sma => f.write_str("sma"),
            Self::Ema => f.write_str("ema"),
        }
    }
}

impl std::str::FromStr for MovingAverageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sma" => Ok(Self::Sma),
            "ema" => Ok(Self::Ema),
            other => Err(format!("unknown moving average '{other}'")),
        }
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
