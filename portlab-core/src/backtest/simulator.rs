//! Event-driven replay of entry/exit signals against one price series.
//!
//! Transitions execute at the close of the event's date. Events are checked
//! as a whole before the first state change, so a rejected run leaves no
//! partial state behind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cost_model::CostModel;
use super::state::{BacktestState, PositionState};
use super::trade::TradeRecord;
use super::{BacktestError, EquityPoint, MalformedInput};
use crate::config::{BacktestConfig, ConfigError, Sizing};
use crate::domain::{PriceSeries, SignalEvent};
use crate::metrics::PerformanceMetrics;
use crate::signals::SignalSeries;

/// Complete output of one simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub instrument: String,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub final_state: BacktestState,
    pub metrics: PerformanceMetrics,
}

impl BacktestResult {
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().map_or(0.0, |p| p.equity)
    }
}

/// Flat/Long simulator for a single instrument.
#[derive(Debug, Clone)]
pub struct BacktestSimulator {
    config: BacktestConfig,
    costs: CostModel,
}

impl BacktestSimulator {
    pub fn new(config: BacktestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            costs: CostModel::new(config.fee_bps),
            config,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Replay a generator's output.
    pub fn run_signal(
        &self,
        series: &PriceSeries,
        signal: &SignalSeries,
    ) -> Result<BacktestResult, BacktestError> {
        self.run(series, &signal.events())
    }

    /// Replay raw events. `events` may be sparse but must be in strictly
    /// increasing date order and name dates present in `series`.
    pub fn run(
        &self,
        series: &PriceSeries,
        events: &[SignalEvent],
    ) -> Result<BacktestResult, BacktestError> {
        let schedule = self.schedule(series, events)?;
        let points = series.points();

        let mut state = BacktestState::new(self.config.initial_cash);
        let mut curve = Vec::with_capacity(points.len());
        let mut trades = Vec::new();
        let mut open: Option<OpenTrade> = None;
        let mut bars_in_market = 0usize;

        for (bar, &(date, price)) in points.iter().enumerate() {
            if let Some(event) = schedule[bar] {
                match (state.state(), event.entry, event.exit) {
                    (PositionState::Flat, true, false) => {
                        let quantity = self.entry_quantity(&state, price);
                        if quantity > 0.0 {
                            let fee = state.enter(quantity, price, &self.costs);
                            open = Some(OpenTrade::new(bar, date, price, quantity, fee));
                            debug!(%date, price, quantity, fee, "entry");
                        } else {
                            warn!(%date, cash = state.cash, "entry skipped: nothing affordable");
                        }
                    }
                    (PositionState::Long, false, true) => {
                        let (quantity, fee) = state.exit(price, &self.costs);
                        if let Some(trade) = open.take() {
                            let instrument = series.instrument();
                            trades.push(trade.close(instrument, bar, date, price, fee, false));
                        }
                        debug!(%date, price, quantity, fee, "exit");
                    }
                    // Entry while Long, exit while Flat, or no flags: ignored.
                    _ => {}
                }
            }

            if let Some(trade) = open.as_mut() {
                trade.track(price);
                bars_in_market += 1;
            }
            state.date = Some(date);
            curve.push(EquityPoint {
                date,
                equity: state.equity(price),
                cash: state.cash,
                exposure: state.position * price,
            });
        }

        if let (Some(trade), Some(&(date, price))) = (open.take(), points.last()) {
            let last = points.len() - 1;
            trades.push(trade.close(series.instrument(), last, date, price, 0.0, true));
        }

        let equity: Vec<f64> = curve.iter().map(|p| p.equity).collect();
        let exposure = if points.is_empty() {
            0.0
        } else {
            bars_in_market as f64 / points.len() as f64
        };
        let metrics = PerformanceMetrics::compute(&equity, &trades, state.costs, exposure);

        Ok(BacktestResult {
            instrument: series.instrument().to_string(),
            equity_curve: curve,
            trades,
            final_state: state,
            metrics,
        })
    }

    /// Validate every event and place it on the series' bar index.
    fn schedule(
        &self,
        series: &PriceSeries,
        events: &[SignalEvent],
    ) -> Result<Vec<Option<SignalEvent>>, BacktestError> {
        if series.is_empty() {
            return Err(MalformedInput::EmptySeries(series.instrument().to_string()).into());
        }
        let mut schedule = vec![None; series.len()];
        let mut prev: Option<NaiveDate> = None;
        for event in events {
            if event.is_conflicting() {
                return Err(BacktestError::ConflictingSignal {
                    instrument: series.instrument().to_string(),
                    date: event.date,
                });
            }
            if let Some(p) = prev {
                if event.date <= p {
                    return Err(MalformedInput::UnorderedEvents { date: event.date }.into());
                }
            }
            prev = Some(event.date);
            let bar = series
                .position(event.date)
                .ok_or_else(|| MalformedInput::UnknownDate {
                    instrument: series.instrument().to_string(),
                    date: event.date,
                })?;
            schedule[bar] = Some(*event);
        }
        Ok(schedule)
    }

    fn entry_quantity(&self, state: &BacktestState, price: f64) -> f64 {
        let affordable = self.costs.affordable_quantity(state.cash, price);
        match self.config.sizing {
            Sizing::AllCash => affordable,
            Sizing::FixedQuantity { quantity } => quantity.min(affordable),
            Sizing::FixedNotional { notional } => (notional / price).min(affordable),
        }
    }
}

/// Running bookkeeping for the trade currently held.
#[derive(Debug, Clone)]
struct OpenTrade {
    bar: usize,
    date: NaiveDate,
    price: f64,
    quantity: f64,
    entry_fee: f64,
    mae: f64,
    mfe: f64,
}

impl OpenTrade {
    fn new(bar: usize, date: NaiveDate, price: f64, quantity: f64, entry_fee: f64) -> Self {
        Self {
            bar,
            date,
            price,
            quantity,
            entry_fee,
            mae: 0.0,
            mfe: 0.0,
        }
    }

    fn track(&mut self, price: f64) {
        let unrealized = (price - self.price) * self.quantity;
        self.mae = self.mae.min(unrealized);
        self.mfe = self.mfe.max(unrealized);
    }

    fn close(
        self,
        instrument: &str,
        bar: usize,
        date: NaiveDate,
        price: f64,
        exit_fee: f64,
        still_open: bool,
    ) -> TradeRecord {
        let gross_pnl = (price - self.price) * self.quantity;
        let fees = self.entry_fee + exit_fee;
        TradeRecord {
            instrument: instrument.to_string(),
            entry_bar: self.bar,
            entry_date: self.date,
            entry_price: self.price,
            exit_bar: bar,
            exit_date: date,
            exit_price: price,
            quantity: self.quantity,
            gross_pnl,
            fees,
            net_pnl: gross_pnl - fees,
            bars_held: bar - self.bar,
            mae: self.mae,
            mfe: self.mfe,
            open: still_open,
        }
    }
}
