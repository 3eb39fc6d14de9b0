//! Position state machine and the mutable account of one simulation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::cost_model::CostModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Flat,
    Long,
}

/// Account as of one timestamp. Owned by a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestState {
    pub date: Option<NaiveDate>,
    /// Units held; zero when flat.
    pub position: f64,
    pub cash: f64,
    /// Fees paid so far.
    pub costs: f64,
}

impl BacktestState {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            date: None,
            position: 0.0,
            cash: initial_cash,
            costs: 0.0,
        }
    }

    pub fn state(&self) -> PositionState {
        if self.position > 0.0 {
            PositionState::Long
        } else {
            PositionState::Flat
        }
    }

    /// Mark-to-market value: `cash + position * price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position * price
    }

    /// Flat→Long. Returns the fee paid.
    pub(crate) fn enter(&mut self, quantity: f64, price: f64, costs: &CostModel) -> f64 {
        debug_assert_eq!(self.state(), PositionState::Flat);
        let fee = costs.fee(price, quantity);
        self.cash -= quantity * price + fee;
        self.costs += fee;
        self.position = quantity;
        fee
    }

    /// Long→Flat. Returns `(quantity sold, fee paid)`.
    pub(crate) fn exit(&mut self, price: f64, costs: &CostModel) -> (f64, f64) {
        debug_assert_eq!(self.state(), PositionState::Long);
        let quantity = self.position;
        let fee = costs.fee(price, quantity);
        self.cash += quantity * price - fee;
        self.costs += fee;
        self.position = 0.0;
        (quantity, fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_at_constant_price_costs_two_fees() {
        let costs = CostModel::new(5.0);
        let mut s = BacktestState::new(10_000.0);
        let entry_fee = s.enter(50.0, 100.0, &costs);
        assert_eq!(s.state(), PositionState::Long);
        assert!((s.equity(100.0) - (10_000.0 - entry_fee)).abs() < 1e-9);
        let (qty, exit_fee) = s.exit(100.0, &costs);
        assert_eq!(qty, 50.0);
        assert_eq!(s.state(), PositionState::Flat);
        assert!((s.cash - (10_000.0 - entry_fee - exit_fee)).abs() < 1e-9);
        assert!((s.costs - 5.0).abs() < 1e-9);
    }
}
