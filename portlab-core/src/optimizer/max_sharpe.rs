//! Maximum-Sharpe portfolio solver.
//!
//! Long-only: the tangency problem `max (μ − r_f)ᵀw / √(wᵀΣw)` with `w ≥ 0`,
//! `Σw = 1` is homogeneous in `w`, so it is solved as the convex QP
//!
//! ```text
//! min yᵀΣy   s.t.  aᵀy = 1,  y ≥ 0        (a = μ − r_f)
//! ```
//!
//! with a primal active-set method, then rescaled `w = y / Σy`. Each
//! iteration solves the equality-constrained subproblem on the free set in
//! closed form, `y_F = Σ_FF⁻¹ a_F / (a_Fᵀ Σ_FF⁻¹ a_F)`.
//!
//! With shorting allowed the unconstrained tangency portfolio `Σ⁻¹a`,
//! normalised to sum to one, is returned directly.

use ndarray::{Array1, ArrayView1, Axis};
use tracing::warn;

use super::{Constraints, OptimizeError, PortfolioSolver};
use crate::linalg::{cholesky, submatrix, CovMatrix};

const TOLERANCE: f64 = 1e-12;

/// Exact max-Sharpe solver. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxSharpeSolver;

impl PortfolioSolver for MaxSharpeSolver {
    fn name(&self) -> &'static str {
        "max_sharpe"
    }

    fn solve(
        &self,
        expected_returns: &[f64],
        covariance: &CovMatrix,
        constraints: &Constraints,
    ) -> Result<Vec<f64>, OptimizeError> {
        let excess: Array1<f64> = expected_returns
            .iter()
            .map(|mu| mu - constraints.risk_free_rate)
            .collect();
        let weights = if constraints.allow_short {
            tangency(excess.view(), covariance)?
        } else {
            long_only(excess.view(), covariance)?
        };
        Ok(weights.to_vec())
    }
}

fn not_positive_definite() -> OptimizeError {
    OptimizeError::Infeasible("covariance is not positive-definite".into())
}

fn tangency(a: ArrayView1<'_, f64>, cov: &CovMatrix) -> Result<Array1<f64>, OptimizeError> {
    let chol = cholesky(cov.view()).ok_or_else(not_positive_definite)?;
    let z = chol.solve(a);
    let sum = z.sum();
    if sum <= TOLERANCE {
        return Err(OptimizeError::Infeasible(
            "tangency portfolio has non-positive net exposure".into(),
        ));
    }
    Ok(z / sum)
}

fn long_only(a: ArrayView1<'_, f64>, cov: &CovMatrix) -> Result<Array1<f64>, OptimizeError> {
    let n = a.len();
    let (best, &best_excess) = a
        .indexed_iter()
        .max_by(|x, y| x.1.total_cmp(y.1))
        .ok_or_else(|| OptimizeError::InvalidInput("empty universe".into()))?;
    if best_excess <= TOLERANCE {
        return Err(OptimizeError::Infeasible(
            "no instrument has a positive excess return".into(),
        ));
    }

    // Feasible start: the single best instrument.
    let mut y = Array1::<f64>::zeros(n);
    y[best] = 1.0 / best_excess;
    let mut free = vec![false; n];
    free[best] = true;

    let max_iterations = 50 * n + 100;
    for _ in 0..max_iterations {
        let idx: Vec<usize> = (0..n).filter(|&i| free[i]).collect();
        let target = subproblem(a, cov, &idx)?;

        let step = &target - &y.select(Axis(0), &idx);
        let step_norm = step.iter().map(|s| s.abs()).fold(0.0, f64::max);
        let scale = idx.iter().map(|&i| y[i].abs()).fold(1.0, f64::max);

        if step_norm <= 1e-10 * scale {
            // Stationary on the free set: check multipliers of the bound constraints.
            let grad = cov.dot(&y);
            let lambda = y.dot(&grad);
            let worst = (0..n)
                .filter(|&j| !free[j])
                .map(|j| (j, grad[j] - lambda * a[j]))
                .min_by(|x, y| x.1.total_cmp(&y.1));
            match worst {
                Some((j, nu)) if nu < -1e-12 * lambda.abs().max(TOLERANCE) => free[j] = true,
                _ => return Ok(normalise(&y)),
            }
            continue;
        }

        // Ratio test against the bounds of currently free instruments.
        let mut alpha = 1.0;
        let mut blocking = None;
        for (k, &i) in idx.iter().enumerate() {
            if step[k] < 0.0 {
                let ratio = -y[i] / step[k];
                if ratio < alpha {
                    alpha = ratio;
                    blocking = Some(i);
                }
            }
        }
        for (k, &i) in idx.iter().enumerate() {
            y[i] += alpha * step[k];
        }
        if let Some(i) = blocking {
            y[i] = 0.0;
            free[i] = false;
        }
    }

    warn!(instruments = n, "active-set solver hit its iteration cap; returning last iterate");
    Ok(normalise(&y))
}

/// Closed-form solution of `min yᵀΣy s.t. aᵀy = 1` on a free index set.
fn subproblem(
    a: ArrayView1<'_, f64>,
    cov: &CovMatrix,
    idx: &[usize],
) -> Result<Array1<f64>, OptimizeError> {
    let sub = submatrix(cov.view(), idx);
    let chol = cholesky(sub.view()).ok_or_else(not_positive_definite)?;
    let a_f = a.select(Axis(0), idx);
    let z = chol.solve(a_f.view());
    let denom = a_f.dot(&z);
    if denom <= TOLERANCE {
        return Err(OptimizeError::Infeasible("degenerate free set".into()));
    }
    Ok(z / denom)
}

fn normalise(y: &Array1<f64>) -> Array1<f64> {
    let sum = y.sum();
    y.mapv(|v| (v / sum).max(0.0))
}
