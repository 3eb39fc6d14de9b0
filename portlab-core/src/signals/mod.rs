//! Signal generation: market timing from prices only.
//!
//! Generators never see positions or cash. They map one instrument's price
//! history to a reading per sample; the backtest decides what a reading does.

pub mod crossover;

pub use crossover::{CrossoverSignal, SignalSeries};
