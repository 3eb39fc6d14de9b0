//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Weight validity: long-only weights are non-negative and sum to one, or are all zero
//! 2. Shrinkage bounds: intensity stays in [0, 1] and the matrix stays factorable
//! 3. Signal sanity: a strictly rising series never exits, and events alternate
//! 4. Equity accounting: no events means flat equity; equity = cash + position * price

use chrono::NaiveDate;
use proptest::prelude::*;

use portlab_core::backtest::BacktestSimulator;
use portlab_core::config::{BacktestConfig, SignalConfig};
use portlab_core::domain::{PriceSeries, SignalEvent, SignalReading, WEIGHT_SUM_TOLERANCE};
use portlab_core::estimation::{CovarianceEstimator, ShrinkageTarget};
use portlab_core::linalg;
use portlab_core::optimizer::{Constraints, MeanVarianceOptimizer};
use portlab_core::signals::CrossoverSignal;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// Price columns built from bounded daily returns.
fn arb_columns(assets: usize, rows: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(
        (arb_price(), prop::collection::vec(-0.05..0.05_f64, rows - 1)),
        assets,
    )
    .prop_map(|cols| {
        cols.into_iter()
            .map(|(start, rets)| {
                let mut prices = Vec::with_capacity(rets.len() + 1);
                prices.push(start);
                for r in rets {
                    let last = prices[prices.len() - 1];
                    prices.push(last * (1.0 + r));
                }
                prices
            })
            .collect()
    })
}

fn arb_target() -> impl Strategy<Value = ShrinkageTarget> {
    prop_oneof![
        Just(ShrinkageTarget::Diagonal),
        Just(ShrinkageTarget::ConstantCorrelation)
    ]
}

fn series_from(prices: &[f64]) -> PriceSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    PriceSeries::new(
        "TEST",
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| (base + chrono::Duration::days(i as i64), *p))
            .collect(),
    )
    .unwrap()
}

const NAMES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

// ── 1–2. Estimation and optimization ─────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Long-only optimization yields a valid allocation or no allocation.
    #[test]
    fn long_only_weights_are_valid(
        columns in arb_columns(4, 40),
        target in arb_target(),
        rf in 0.0..0.08_f64,
    ) {
        let named: Vec<(&str, &[f64])> = NAMES
            .iter()
            .zip(&columns)
            .map(|(n, c)| (*n, c.as_slice()))
            .collect();
        let estimate = CovarianceEstimator::new(target).estimate_columns(&named).unwrap();
        let optimizer = MeanVarianceOptimizer::new(Constraints {
            allow_short: false,
            risk_free_rate: rf,
        });

        if let Ok(weights) = optimizer.optimize(&estimate, NAMES[..4].iter().copied()) {
            prop_assert!(weights.iter().all(|(_, w)| w >= 0.0));
            let sum = weights.sum();
            prop_assert!(weights.is_zero() || (sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
            prop_assert_eq!(weights.len(), 4);
        }
    }

    /// Shrinkage intensity is a proper blend, even when assets outnumber rows.
    #[test]
    fn shrinkage_is_bounded_and_positive_definite(
        columns in arb_columns(6, 5),
        target in arb_target(),
    ) {
        let named: Vec<(&str, &[f64])> = NAMES
            .iter()
            .zip(&columns)
            .map(|(n, c)| (*n, c.as_slice()))
            .collect();
        let estimate = CovarianceEstimator::new(target).estimate_columns(&named).unwrap();
        prop_assert!((0.0..=1.0).contains(&estimate.shrinkage));
        prop_assert!(linalg::all_finite(estimate.covariance.view()));
        prop_assert!(linalg::cholesky(estimate.covariance.view()).is_some());
    }
}

// ── 3. Signals ───────────────────────────────────────────────────────

proptest! {
    /// A strictly rising series keeps the fast average above the slow one.
    #[test]
    fn rising_series_never_exits(
        start in arb_price(),
        steps in prop::collection::vec(0.01..5.0_f64, 30..120),
        fast in 2usize..8,
        gap in 1usize..15,
    ) {
        let mut prices = vec![start];
        for s in steps {
            let last = prices[prices.len() - 1];
            prices.push(last + s);
        }
        let signal = CrossoverSignal::from_config(&SignalConfig::new(fast, fast + gap)).unwrap();
        let readings = signal.generate(&series_from(&prices));
        prop_assert_eq!(readings.count(SignalReading::Exit), 0);
        prop_assert!(readings.count(SignalReading::Entry) <= 1);
        prop_assert_eq!(readings.len(), prices.len());
    }

    /// Entries and exits strictly alternate on an oscillating series.
    #[test]
    fn entries_and_exits_alternate(
        amplitude in 1.0..20.0_f64,
        period in 5.0..40.0_f64,
        phase in 0.0..std::f64::consts::TAU,
        len in 60usize..240,
        fast in 2usize..8,
        gap in 1usize..15,
    ) {
        let prices: Vec<f64> = (0..len)
            .map(|i| 100.0 + amplitude * (std::f64::consts::TAU * i as f64 / period + phase).sin())
            .collect();
        let signal = CrossoverSignal::from_config(&SignalConfig::new(fast, fast + gap)).unwrap();
        let events: Vec<SignalReading> = signal
            .generate(&series_from(&prices))
            .points
            .iter()
            .map(|p| p.reading)
            .filter(|r| matches!(r, SignalReading::Entry | SignalReading::Exit))
            .collect();
        for pair in events.windows(2) {
            prop_assert_ne!(pair[0], pair[1]);
        }
    }
}

// ── 4. Equity accounting ─────────────────────────────────────────────

proptest! {
    /// With no events, equity equals starting cash at every bar.
    #[test]
    fn no_events_means_flat_equity(
        prices in prop::collection::vec(arb_price(), 1..80),
        cash in 1_000.0..1_000_000.0_f64,
    ) {
        let sim = BacktestSimulator::new(BacktestConfig {
            initial_cash: cash,
            ..BacktestConfig::default()
        })
        .unwrap();
        let result = sim.run(&series_from(&prices), &[]).unwrap();
        prop_assert!(result.equity_curve.iter().all(|p| p.equity == cash));
    }

    /// Equity identity holds on every bar for any alternating event stream.
    #[test]
    fn equity_identity_holds(
        prices in prop::collection::vec(arb_price(), 10..80),
        toggles in prop::collection::vec(any::<bool>(), 10..80),
        fee_bps in 0.0..50.0_f64,
    ) {
        let series = series_from(&prices);
        let events: Vec<SignalEvent> = series
            .dates()
            .zip(&toggles)
            .enumerate()
            .filter(|(_, (_, t))| **t)
            .map(|(i, (d, _))| if i % 2 == 0 { SignalEvent::entry(d) } else { SignalEvent::exit(d) })
            .collect();
        let sim = BacktestSimulator::new(BacktestConfig {
            fee_bps,
            ..BacktestConfig::default()
        })
        .unwrap();
        let result = sim.run(&series, &events).unwrap();

        for (point, (_, price)) in result.equity_curve.iter().zip(series.points()) {
            let rebuilt = point.cash + point.exposure;
            prop_assert!((point.equity - rebuilt).abs() < 1e-6);
            prop_assert!(point.exposure >= 0.0);
            prop_assert!(*price > 0.0);
        }
        let trade_fees: f64 = result.trades.iter().map(|t| t.fees).sum();
        prop_assert!((trade_fees - result.final_state.costs).abs() < 1e-6);
    }
}
