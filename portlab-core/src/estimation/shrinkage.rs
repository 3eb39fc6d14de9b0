//! Ledoit–Wolf shrinkage of the sample covariance toward a structured target.
//!
//! The optimal intensity is estimated from the data (Ledoit & Wolf, 2003/2004)
//! and clamped to `[0, 1]`. If the blended matrix still fails a Cholesky
//! factorisation, the intensity is raised stepwise toward the target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2, Axis};

use crate::linalg::{blend, cholesky, frobenius_dist_sq, CovMatrix};

/// Structured matrix the sample covariance is shrunk toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkageTarget {
    /// Sample variances on the diagonal, zero covariance.
    Diagonal,
    /// Sample variances with a single average pairwise correlation.
    ConstantCorrelation,
}

impl Default for ShrinkageTarget {
    fn default() -> Self {
        Self::ConstantCorrelation
    }
}

impl fmt::Display for ShrinkageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diagonal => f.write_str("diagonal"),
            Self::ConstantCorrelation => f.write_str("constant_correlation"),
        }
    }
}

impl FromStr for ShrinkageTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "diagonal" | "diag" => Ok(Self::Diagonal),
            "constant_correlation" | "cc" => Ok(Self::ConstantCorrelation),
            other => Err(format!("unknown shrinkage target '{other}'")),
        }
    }
}

/// Shrinkage result in per-period units.
#[derive(Debug, Clone)]
pub struct Shrunk {
    pub covariance: CovMatrix,
    /// Intensity actually applied, after any positive-definite escalation.
    pub intensity: f64,
    /// Intensity the estimator chose before escalation.
    pub estimated_intensity: f64,
    /// Target actually blended in. Falls back to `Diagonal` when a
    /// constant-correlation target is itself singular.
    pub target: ShrinkageTarget,
}

/// Escalation schedule: fraction of the remaining gap to the target.
const ESCALATION_STEPS: [f64; 5] = [0.1, 0.25, 0.5, 0.75, 1.0];

/// Shrink the covariance of `returns` (one `Vec` per instrument, equal
/// lengths, at least two observations).
pub fn ledoit_wolf(returns: &[Vec<f64>], target: ShrinkageTarget) -> Shrunk {
    let t = returns.first().map(|r| r.len()).unwrap_or(0);
    debug_assert!(returns.iter().all(|r| r.len() == t));

    let x = demeaned(returns);
    let sample = biased_covariance(x.view(), t);
    let prior = target_matrix(&sample, target);
    let delta = optimal_intensity(x.view(), &sample, &prior, target, t);

    if let Some(shrunk) = escalate(&prior, &sample, delta, target) {
        return shrunk;
    }

    // Target itself was singular (perfectly correlated constant-correlation
    // prior); the diagonal prior is positive-definite for positive variances.
    let diagonal = target_matrix(&sample, ShrinkageTarget::Diagonal);
    escalate(&diagonal, &sample, delta, ShrinkageTarget::Diagonal).unwrap_or(Shrunk {
        covariance: diagonal,
        intensity: 1.0,
        estimated_intensity: delta,
        target: ShrinkageTarget::Diagonal,
    })
}

fn escalate(
    prior: &CovMatrix,
    sample: &CovMatrix,
    delta: f64,
    target: ShrinkageTarget,
) -> Option<Shrunk> {
    let candidates =
        std::iter::once(delta).chain(ESCALATION_STEPS.iter().map(|s| delta + (1.0 - delta) * s));
    for intensity in candidates {
        let blended = blend(prior, sample, intensity);
        if cholesky(blended.view()).is_some() {
            return Some(Shrunk {
                covariance: blended,
                intensity,
                estimated_intensity: delta,
                target,
            });
        }
    }
    None
}

/// Instruments on rows, observations on columns, each row demeaned.
fn demeaned(returns: &[Vec<f64>]) -> Array2<f64> {
    let t = returns.first().map(|r| r.len()).unwrap_or(0);
    let mut x = Array2::from_shape_fn((returns.len(), t), |(i, k)| returns[i][k]);
    for mut row in x.axis_iter_mut(Axis(0)) {
        let m = row.mean().unwrap_or(0.0);
        row.mapv_inplace(|v| v - m);
    }
    x
}

/// Maximum-likelihood covariance (1/T), as used inside the shrinkage formulas.
fn biased_covariance(x: ArrayView2<'_, f64>, t: usize) -> CovMatrix {
    let n = x.nrows();
    let mut s = CovMatrix::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let c = x.row(i).dot(&x.row(j)) / t as f64;
            s[[i, j]] = c;
            s[[j, i]] = c;
        }
    }
    s
}

fn average_correlation(sample: &CovMatrix) -> f64 {
    let n = sample.nrows();
    if n < 2 {
        return 0.0;
    }
    let sd = sample.diag().mapv(f64::sqrt);
    let total: f64 = sample
        .indexed_iter()
        .filter(|((i, j), _)| i != j)
        .map(|((i, j), s_ij)| s_ij / (sd[i] * sd[j]))
        .sum();
    total / (n * (n - 1)) as f64
}

fn target_matrix(sample: &CovMatrix, target: ShrinkageTarget) -> CovMatrix {
    let var = sample.diag();
    let r_bar = match target {
        ShrinkageTarget::Diagonal => 0.0,
        ShrinkageTarget::ConstantCorrelation => average_correlation(sample),
    };
    CovMatrix::from_shape_fn(sample.dim(), |(i, j)| {
        if i == j {
            var[i]
        } else {
            r_bar * (var[i] * var[j]).sqrt()
        }
    })
}

/// Estimated optimal intensity `clamp(κ / T, 0, 1)` with `κ = (π − ρ) / γ`.
fn optimal_intensity(
    x: ArrayView2<'_, f64>,
    sample: &CovMatrix,
    prior: &CovMatrix,
    target: ShrinkageTarget,
    t: usize,
) -> f64 {
    let n = x.nrows();
    let tf = t as f64;

    // π: asymptotic variances of the sample covariance entries.
    let pi = CovMatrix::from_shape_fn((n, n), |(i, j)| {
        let s_ij = sample[[i, j]];
        x.row(i)
            .iter()
            .zip(x.row(j))
            .map(|(a, b)| (a * b - s_ij).powi(2))
            .sum::<f64>()
            / tf
    });
    let pi_hat = pi.sum();
    let pi_diag = pi.diag().sum();

    // ρ: asymptotic covariance between target and sample entries.
    let rho_hat = match target {
        ShrinkageTarget::Diagonal => pi_diag,
        ShrinkageTarget::ConstantCorrelation => {
            let r_bar = average_correlation(sample);
            let var = sample.diag();
            let sd = var.mapv(f64::sqrt);
            let theta = |k: usize, i: usize, j: usize| {
                let s_ij = sample[[i, j]];
                x.row(k)
                    .iter()
                    .zip(x.row(i).iter().zip(x.row(j)))
                    .map(|(c, (a, b))| (c * c - var[k]) * (a * b - s_ij))
                    .sum::<f64>()
                    / tf
            };
            let mut off = 0.0;
            for i in 0..n {
                for j in 0..n {
                    if i != j {
                        off += 0.5
                            * ((sd[j] / sd[i]) * theta(i, i, j) + (sd[i] / sd[j]) * theta(j, i, j));
                    }
                }
            }
            pi_diag + r_bar * off
        }
    };

    // γ: misspecification of the target.
    let gamma_hat = frobenius_dist_sq(sample, prior);
    if gamma_hat <= f64::EPSILON * pi_hat.abs().max(f64::MIN_POSITIVE) || !gamma_hat.is_finite() {
        // Sample already equals the target.
        return 1.0;
    }
    let kappa = (pi_hat - rho_hat) / gamma_hat;
    (kappa / tf).clamp(0.0, 1.0)
}
