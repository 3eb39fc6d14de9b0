//! TradeRecord: one entry→exit round trip.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub instrument: String,

    pub entry_bar: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,

    /// For an open trade: the last bar, marked to market.
    pub exit_bar: usize,
    pub exit_date: NaiveDate,
    pub exit_price: f64,

    pub quantity: f64,

    pub gross_pnl: f64,
    /// Entry plus exit fees. An open trade carries only its entry fee.
    pub fees: f64,
    pub net_pnl: f64,

    pub bars_held: usize,

    /// Maximum adverse excursion (worst unrealized loss during the trade).
    pub mae: f64,
    /// Maximum favorable excursion (best unrealized gain during the trade).
    pub mfe: f64,

    /// Still open at the end of the run.
    pub open: bool,
}

impl TradeRecord {
    /// Return on the trade as a fraction of entry cost.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0.0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.quantity)
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}
