//! End-to-end backtest scenarios: signal generation through simulation.

use chrono::NaiveDate;

use portlab_core::backtest::{BacktestError, PositionState};
use portlab_core::config::{BacktestConfig, SignalConfig, Sizing};
use portlab_core::domain::{PriceSeries, SignalEvent, SignalReading};
use portlab_core::signals::CrossoverSignal;
use portlab_core::BacktestSimulator;

fn day(i: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i)
}

fn series_from(prices: &[f64]) -> PriceSeries {
    PriceSeries::new(
        "SPY",
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| (day(i as i64), *p))
            .collect(),
    )
    .unwrap()
}

fn config(fee_bps: f64, sizing: Sizing) -> BacktestConfig {
    BacktestConfig {
        fee_bps,
        initial_cash: 100_000.0,
        sizing,
    }
}

#[test]
fn round_trip_at_flat_price_loses_exactly_two_fees() {
    let sim = BacktestSimulator::new(config(5.0, Sizing::FixedQuantity { quantity: 100.0 })).unwrap();
    let series = series_from(&[100.0; 30]);
    let events = [SignalEvent::entry(day(10)), SignalEvent::exit(day(20))];

    let result = sim.run(&series, &events).unwrap();

    let one_fee = 100.0 * 100.0 * 0.0005;
    let final_equity = result.final_equity();
    assert!((100_000.0 - final_equity - 2.0 * one_fee).abs() < 1e-9);
    // Equity drops by the entry fee on the entry bar.
    let before = result.equity_curve[9].equity;
    let after = result.equity_curve[10].equity;
    assert!((before - after - one_fee).abs() < 1e-9);
    // Holding at a flat price leaves equity unchanged until the exit bar.
    let held = result.equity_curve[10].equity;
    for point in &result.equity_curve[10..20] {
        assert!((point.equity - held).abs() < 1e-9, "{point:?}");
    }
    // The exit bar drops by exactly one more fee.
    let exit_drop = result.equity_curve[19].equity - result.equity_curve[20].equity;
    assert!((exit_drop - one_fee).abs() < 1e-9);
    // Flat afterwards.
    let settled = result.equity_curve[20].equity;
    for point in &result.equity_curve[20..] {
        assert!((point.equity - settled).abs() < 1e-9, "{point:?}");
    }
    assert!((settled - final_equity).abs() < 1e-9);
    assert_eq!(result.trades.len(), 1);
    assert!((result.trades[0].fees - 2.0 * one_fee).abs() < 1e-9);
    assert_eq!(result.final_state.state(), PositionState::Flat);
    assert!((result.metrics.total_fees - 2.0 * one_fee).abs() < 1e-9);
}

#[test]
fn no_events_keeps_equity_flat_at_initial_cash() {
    let sim = BacktestSimulator::new(BacktestConfig::default()).unwrap();
    let series = series_from(&[100.0, 105.0, 95.0, 120.0, 80.0]);
    let result = sim.run(&series, &[]).unwrap();
    assert_eq!(result.equity_curve.len(), 5);
    assert!(result
        .equity_curve
        .iter()
        .all(|p| p.equity == 100_000.0 && p.exposure == 0.0));
    assert!(result.trades.is_empty());
    assert_eq!(result.metrics.max_drawdown, 0.0);
}

#[test]
fn conflicting_event_is_rejected_before_any_state_change() {
    let sim = BacktestSimulator::new(BacktestConfig::default()).unwrap();
    let series = series_from(&[100.0; 10]);
    let conflicting = SignalEvent {
        date: day(6),
        entry: true,
        exit: true,
    };
    let events = [SignalEvent::entry(day(2)), conflicting];

    let err = sim.run(&series, &events).unwrap_err();
    assert_eq!(
        err,
        BacktestError::ConflictingSignal {
            instrument: "SPY".into(),
            date: day(6),
        }
    );

    // The simulator is reusable and unaffected by the rejected run.
    let clean = sim.run(&series, &events[..1]).unwrap();
    assert_eq!(clean.trades.len(), 1);
}

#[test]
fn exit_while_flat_is_ignored() {
    let sim = BacktestSimulator::new(BacktestConfig::default()).unwrap();
    let series = series_from(&[100.0; 10]);
    let result = sim.run(&series, &[SignalEvent::exit(day(3))]).unwrap();
    assert!(result.trades.is_empty());
    assert_eq!(result.final_equity(), 100_000.0);
}

#[test]
fn golden_cross_then_death_cross_produces_one_trade() {
    // Decline, rally, decline: the 3/8 crossover enters on the rally and
    // exits on the second decline.
    let mut prices = Vec::new();
    prices.extend((0..20).map(|i| 120.0 - i as f64));
    prices.extend((0..20).map(|i| 100.0 + 2.0 * i as f64));
    prices.extend((0..20).map(|i| 140.0 - 2.0 * i as f64));
    let series = series_from(&prices);

    let signal = CrossoverSignal::from_config(&SignalConfig::new(3, 8)).unwrap();
    let readings = signal.generate(&series);
    assert_eq!(readings.count(SignalReading::Entry), 1);
    assert_eq!(readings.count(SignalReading::Exit), 1);

    let sim = BacktestSimulator::new(config(0.0, Sizing::AllCash)).unwrap();
    let result = sim.run_signal(&series, &readings).unwrap();
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert!(!trade.open);
    assert!(trade.entry_bar >= 20 && trade.entry_bar < 40);
    assert!(trade.exit_bar > 40);
    assert!(trade.net_pnl > 0.0);
}

#[test]
fn warmup_readings_are_undefined() {
    let series = series_from(&(0..60).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
    let signal = CrossoverSignal::from_config(&SignalConfig::new(5, 20)).unwrap();
    let readings = signal.generate(&series);
    let warmup = signal.warmup();
    assert!(readings.points[..warmup]
        .iter()
        .all(|p| p.reading == SignalReading::Undefined));
    assert!(readings.points[warmup..]
        .iter()
        .all(|p| p.reading.is_defined()));
}

#[test]
fn invalid_backtest_config_is_rejected() {
    let bad = BacktestConfig {
        initial_cash: -1.0,
        ..BacktestConfig::default()
    };
    assert!(BacktestSimulator::new(bad).is_err());
}
