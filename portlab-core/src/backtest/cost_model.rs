//! Proportional transaction costs.

use serde::{Deserialize, Serialize};

/// Fee charged as basis points of traded notional, per side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub fee_bps: f64,
}

impl CostModel {
    pub fn new(fee_bps: f64) -> Self {
        Self { fee_bps }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0)
    }

    /// Fee as a fraction of notional.
    pub fn rate(&self) -> f64 {
        self.fee_bps / 10_000.0
    }

    /// `fee = price * quantity * (fee_bps / 10_000)`
    pub fn fee(&self, price: f64, quantity: f64) -> f64 {
        price * quantity.abs() * self.rate()
    }

    /// Largest quantity whose cost plus fee fits in `cash`.
    pub fn affordable_quantity(&self, cash: f64, price: f64) -> f64 {
        if cash <= 0.0 || price <= 0.0 {
            return 0.0;
        }
        cash / (price * (1.0 + self.rate()))
    }
}
