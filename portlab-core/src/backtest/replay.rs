//! Replay a weight time series as a rebalanced portfolio.
//!
//! Each entry takes effect at the close of the first table date on or after
//! its timestamp. Holdings are rescaled to the target weights, paying the
//! proportional fee on traded notional; between rebalances they drift with
//! prices. An all-zero entry liquidates to cash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::cost_model::CostModel;
use super::{BacktestError, EquityPoint, MalformedInput};
use crate::domain::{PriceTable, WeightTimeSeries, WeightVector};
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub equity_curve: Vec<EquityPoint>,
    pub rebalances: usize,
    pub total_fees: f64,
    /// Traded notional divided by mean equity.
    pub turnover: f64,
    pub metrics: PerformanceMetrics,
}

pub fn replay_weights(
    table: &PriceTable,
    weights: &WeightTimeSeries,
    fee_bps: f64,
    initial_cash: f64,
) -> Result<ReplayResult, BacktestError> {
    if table.is_empty() {
        return Err(MalformedInput::EmptySeries("price table".into()).into());
    }
    let costs = CostModel::new(fee_bps);
    let mut cash = initial_cash;
    let mut holdings: BTreeMap<&str, f64> = BTreeMap::new();
    let mut last_price: BTreeMap<&str, f64> = BTreeMap::new();
    let mut applied: Option<usize> = None;
    let mut curve = Vec::with_capacity(table.len());
    let mut total_fees = 0.0;
    let mut traded = 0.0;
    let mut rebalances = 0;
    let mut bars_in_market = 0usize;

    let entries = weights.entries();
    for (row, &date) in table.dates().iter().enumerate() {
        for (id, column) in table.columns() {
            let p = column[row];
            if p.is_finite() && p > 0.0 {
                last_price.insert(id.as_str(), p);
            }
        }

        let active = entries.partition_point(|e| e.timestamp <= date).checked_sub(1);
        if let Some(idx) = active.filter(|i| Some(*i) != applied) {
            let target = &entries[idx].weights;
            let (fees, notional) = rebalance(target, &mut cash, &mut holdings, &last_price, &costs);
            total_fees += fees;
            traded += notional;
            rebalances += 1;
            applied = Some(idx);
            debug!(%date, fees, notional, "replay rebalance");
        }

        let exposure: f64 = holdings
            .iter()
            .map(|(id, q)| q * last_price.get(id).copied().unwrap_or(0.0))
            .sum();
        if holdings.values().any(|q| *q != 0.0) {
            bars_in_market += 1;
        }
        curve.push(EquityPoint {
            date,
            equity: cash + exposure,
            cash,
            exposure,
        });
    }

    let equity: Vec<f64> = curve.iter().map(|p| p.equity).collect();
    let mean_equity = equity.iter().sum::<f64>() / equity.len() as f64;
    let turnover = if mean_equity > 0.0 {
        traded / mean_equity
    } else {
        0.0
    };
    let exposure = bars_in_market as f64 / table.len() as f64;
    let metrics = PerformanceMetrics::compute(&equity, &[], total_fees, exposure);

    Ok(ReplayResult {
        equity_curve: curve,
        rebalances,
        total_fees,
        turnover,
        metrics,
    })
}

/// Move holdings to `target`. Instruments without a known price keep their
/// current holding. Returns `(fees, traded notional)`.
fn rebalance<'a>(
    target: &'a WeightVector,
    cash: &mut f64,
    holdings: &mut BTreeMap<&'a str, f64>,
    prices: &BTreeMap<&str, f64>,
    costs: &CostModel,
) -> (f64, f64) {
    let value_of = |id: &str, q: f64| q * prices.get(id).copied().unwrap_or(0.0);
    let equity = *cash + holdings.iter().map(|(id, q)| value_of(*id, *q)).sum::<f64>();
    // Target notional leaves room for the fees of a full move out of cash.
    let investable = equity / (1.0 + costs.rate());

    let mut fees = 0.0;
    let mut notional = 0.0;

    let mut ids: Vec<&'a str> = target.iter().map(|(id, _)| id).collect();
    for id in holdings.keys() {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }

    for id in ids {
        let Some(&price) = prices.get(id) else {
            continue;
        };
        let current = holdings.get(id).copied().unwrap_or(0.0);
        let desired = target.get(id) * investable / price;
        let delta = desired - current;
        if delta == 0.0 {
            continue;
        }
        let fee = costs.fee(price, delta);
        *cash -= delta * price + fee;
        fees += fee;
        notional += delta.abs() * price;
        if desired == 0.0 {
            holdings.remove(id);
        } else {
            holdings.insert(id, desired);
        }
    }
    (fees, notional)
}
