//! Summary statistics for equity curves and closed trades.
//!
//! Ratios are annualised with [`TRADING_DAYS_PER_YEAR`] bars per year and use
//! simple bar-to-bar returns. Degenerate inputs (one bar, zero variance,
//! non-positive equity) produce `0.0` rather than NaN so results stay sortable.

use serde::{Deserialize, Serialize};

use crate::backtest::TradeRecord;

/// Bars per year assumed when annualising.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Cap applied to profit factor when there are no losing trades.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

const VARIANCE_FLOOR: f64 = 1e-15;

/// Headline statistics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Negative fraction, `-0.2` for a 20% peak-to-trough loss.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub total_fees: f64,
    /// Fraction of bars with a position on.
    pub exposure: f64,
}

impl PerformanceMetrics {
    pub fn compute(
        equity_curve: &[f64],
        trades: &[TradeRecord],
        total_fees: f64,
        exposure: f64,
    ) -> Self {
        let growth = cagr(equity_curve);
        let drawdown = max_drawdown(equity_curve);
        let excess = ExcessReturns::new(equity_curve, 0.0);
        Self {
            total_return: total_return(equity_curve),
            cagr: growth,
            sharpe: excess.as_ref().map_or(0.0, ExcessReturns::sharpe),
            sortino: excess.as_ref().map_or(0.0, ExcessReturns::sortino),
            calmar: calmar(growth, drawdown),
            max_drawdown: drawdown,
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            total_fees,
            exposure,
        }
    }
}

/// Per-bar returns net of a per-bar risk-free rate. `None` below two returns.
struct ExcessReturns {
    values: Vec<f64>,
    mean: f64,
}

impl ExcessReturns {
    fn new(equity_curve: &[f64], annual_risk_free: f64) -> Option<Self> {
        let per_bar = annual_risk_free / TRADING_DAYS_PER_YEAR;
        let values: Vec<f64> = bar_returns(equity_curve)
            .into_iter()
            .map(|r| r - per_bar)
            .collect();
        if values.len() < 2 {
            return None;
        }
        let mean = mean_f64(&values);
        Some(Self { values, mean })
    }

    fn annualise(&self, deviation: f64) -> f64 {
        if deviation < VARIANCE_FLOOR {
            0.0
        } else {
            self.mean / deviation * TRADING_DAYS_PER_YEAR.sqrt()
        }
    }

    fn sharpe(&self) -> f64 {
        self.annualise(std_dev(&self.values))
    }

    /// Downside deviation divides by the full sample count.
    fn sortino(&self) -> f64 {
        let sum_sq: f64 = self
            .values
            .iter()
            .filter(|r| **r < 0.0)
            .map(|r| r * r)
            .sum();
        self.annualise((sum_sq / self.values.len() as f64).sqrt())
    }
}

/// `(last - first) / first`.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match equity_curve {
        [first, .., last] if *first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}

/// Compound annual growth. The curve spans `len - 1` trading days.
pub fn cagr(equity_curve: &[f64]) -> f64 {
    let [first, .., last] = equity_curve else {
        return 0.0;
    };
    if *first <= 0.0 || *last <= 0.0 {
        return 0.0;
    }
    let years = (equity_curve.len() - 1) as f64 / TRADING_DAYS_PER_YEAR;
    (last / first).powf(years.recip()) - 1.0
}

/// Annualised Sharpe ratio with sample (n-1) standard deviation.
pub fn sharpe_ratio(equity_curve: &[f64], annual_risk_free: f64) -> f64 {
    ExcessReturns::new(equity_curve, annual_risk_free).map_or(0.0, |e| e.sharpe())
}

/// Annualised Sortino ratio.
pub fn sortino_ratio(equity_curve: &[f64], annual_risk_free: f64) -> f64 {
    ExcessReturns::new(equity_curve, annual_risk_free).map_or(0.0, |e| e.sortino())
}

/// CAGR over absolute max drawdown.
pub fn calmar_ratio(equity_curve: &[f64]) -> f64 {
    calmar(cagr(equity_curve), max_drawdown(equity_curve))
}

fn calmar(growth: f64, drawdown: f64) -> f64 {
    if drawdown < 0.0 && growth > 0.0 {
        growth / -drawdown
    } else {
        0.0
    }
}

/// Deepest peak-to-trough loss as a non-positive fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    equity_curve
        .iter()
        .scan(f64::MIN, |peak, &value| {
            *peak = peak.max(value);
            Some(if *peak > 0.0 { value / *peak - 1.0 } else { 0.0 })
        })
        .fold(0.0, f64::min)
}

pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Sum of winning net P&L over sum of losing net P&L.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let (won, lost) = trades.iter().fold((0.0, 0.0), |(won, lost), t| {
        if t.net_pnl >= 0.0 {
            (won + t.net_pnl, lost)
        } else {
            (won, lost - t.net_pnl)
        }
    });
    match (won > 0.0, lost > 1e-10) {
        (_, true) => (won / lost).min(PROFIT_FACTOR_CAP),
        (true, false) => PROFIT_FACTOR_CAP,
        (false, false) => 0.0,
    }
}

/// Simple returns between consecutive points. A non-positive base yields 0.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|pair| match pair {
            [prev, next] if *prev > 0.0 => next / prev - 1.0,
            _ => 0.0,
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation. Zero below two values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}
