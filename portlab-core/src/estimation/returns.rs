//! Return series and expected-return models.

use serde::{Deserialize, Serialize};

/// Simple returns `p[t] / p[t-1] − 1` of consecutive prices.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// How per-period returns become an annualised expected return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedReturnModel {
    /// Geometric: `(Π(1 + r))^(f / n) − 1`.
    Compounded,
    /// Arithmetic: `mean(r) · f`.
    ArithmeticMean,
}

impl Default for ExpectedReturnModel {
    fn default() -> Self {
        Self::Compounded
    }
}

impl ExpectedReturnModel {
    /// Annualised expected return from `returns`, with `f` periods per year.
    pub fn annualize(&self, returns: &[f64], periods_per_year: f64) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let n = returns.len() as f64;
        match self {
            Self::Compounded => {
                let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
                if growth <= 0.0 {
                    return -1.0;
                }
                growth.powf(periods_per_year / n) - 1.0
            }
            Self::ArithmeticMean => returns.iter().sum::<f64>() / n * periods_per_year,
        }
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample variance (n − 1 denominator).
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_returns_basic() {
        let r = simple_returns(&[100.0, 110.0, 99.0]);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn compounded_matches_total_growth_over_one_year() {
        // 252 daily returns that compound to +10%.
        let daily = 1.10_f64.powf(1.0 / 252.0) - 1.0;
        let returns = vec![daily; 252];
        let mu = ExpectedReturnModel::Compounded.annualize(&returns, 252.0);
        assert!((mu - 0.10).abs() < 1e-10);
    }

    #[test]
    fn arithmetic_mean_scales_linearly() {
        let mu = ExpectedReturnModel::ArithmeticMean.annualize(&[0.001, 0.003], 252.0);
        assert!((mu - 0.504).abs() < 1e-12);
    }

    #[test]
    fn variance_of_constant_is_zero() {
        assert_eq!(sample_variance(&[0.01, 0.01, 0.01]), 0.0);
    }
}
