//! Rebalance scheduler scenarios: warm-up, exclusions, fallbacks, timeouts.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use portlab_core::config::PortfolioConfig;
use portlab_core::domain::{PriceTable, RebalanceOutcome};
use portlab_core::linalg::CovMatrix;
use portlab_core::optimizer::{Constraints, OptimizeError, PortfolioSolver};
use portlab_core::RebalanceScheduler;

fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n);
    let mut d = start;
    while dates.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(d);
        }
        d += chrono::Duration::days(1);
    }
    dates
}

fn oscillating(n: usize, base: f64, trend: f64, freq: f64) -> Vec<f64> {
    (0..n)
        .map(|i| base * (1.0 + trend * i as f64) + (i as f64 * freq).sin())
        .collect()
}

fn table_with(columns: Vec<(&str, Vec<f64>)>) -> PriceTable {
    let n = columns[0].1.len();
    let dates = business_days(NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(), n);
    let columns: BTreeMap<String, Vec<f64>> = columns
        .into_iter()
        .map(|(id, col)| (id.to_string(), col))
        .collect();
    PriceTable::new(dates, columns).unwrap()
}

fn three_assets(n: usize) -> PriceTable {
    table_with(vec![
        ("AAA", oscillating(n, 100.0, 0.0008, 0.7)),
        ("BBB", oscillating(n, 60.0, 0.0004, 1.3)),
        ("CCC", oscillating(n, 40.0, 0.0002, 2.1)),
    ])
}

/// Sleeps far longer than any sensible timeout, then returns equal weights.
#[derive(Debug)]
struct SlowSolver(Duration);

impl PortfolioSolver for SlowSolver {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn solve(
        &self,
        expected_returns: &[f64],
        _covariance: &CovMatrix,
        _constraints: &Constraints,
    ) -> Result<Vec<f64>, OptimizeError> {
        std::thread::sleep(self.0);
        let n = expected_returns.len() as f64;
        Ok(vec![1.0 / n; expected_returns.len()])
    }
}

#[test]
fn short_history_produces_no_entries() {
    // 100 days of data against a 252-day minimum: the run is all warm-up.
    let scheduler = RebalanceScheduler::new(PortfolioConfig::default()).unwrap();
    let series = scheduler.run(&three_assets(100));
    assert!(series.is_empty());
}

#[test]
fn first_entry_waits_for_min_history() {
    let config = PortfolioConfig {
        min_history_days: 252,
        ..PortfolioConfig::default()
    };
    let table = three_assets(400);
    let series = RebalanceScheduler::new(config).unwrap().run(&table);
    let first = series.entries().first().expect("at least one rebalance");
    assert!(table.rows_before(first.timestamp) >= 252);
}

#[test]
fn optimized_weights_are_long_only_and_sum_to_one() {
    let config = PortfolioConfig {
        min_history_days: 40,
        ..PortfolioConfig::default()
    };
    let series = RebalanceScheduler::new(config)
        .unwrap()
        .run(&three_assets(300));
    assert!(!series.is_empty());
    for entry in series.entries() {
        match entry.outcome {
            RebalanceOutcome::Optimized => {
                assert!((entry.weights.sum() - 1.0).abs() < 1e-6);
                assert!(entry.weights.iter().all(|(_, w)| w >= 0.0));
                let shrinkage = entry.shrinkage.expect("optimized entries record shrinkage");
                assert!((0.0..=1.0).contains(&shrinkage));
            }
            _ => assert!(entry.weights.is_zero()),
        }
        assert_eq!(entry.weights.len(), 3);
    }
}

#[test]
fn instrument_with_gaps_is_excluded_and_gets_zero_weight() {
    let n = 200;
    let mut gappy = oscillating(n, 80.0, 0.001, 0.5);
    for p in gappy.iter_mut().skip(10).step_by(15) {
        *p = f64::NAN;
    }
    let table = table_with(vec![
        ("AAA", oscillating(n, 100.0, 0.0008, 0.7)),
        ("BBB", oscillating(n, 60.0, 0.0004, 1.3)),
        ("GAP", gappy),
    ]);
    let config = PortfolioConfig {
        min_history_days: 40,
        ..PortfolioConfig::default()
    };
    let series = RebalanceScheduler::new(config).unwrap().run(&table);
    assert!(!series.is_empty());
    for entry in series.entries() {
        assert!(entry.excluded.contains(&"GAP".to_string()));
        assert_eq!(entry.weights.get("GAP"), 0.0);
    }
}

#[test]
fn constant_price_instrument_is_excluded() {
    let n = 150;
    let table = table_with(vec![
        ("AAA", oscillating(n, 100.0, 0.0008, 0.7)),
        ("BBB", oscillating(n, 60.0, 0.0004, 1.3)),
        ("FLAT", vec![25.0; n]),
    ]);
    let config = PortfolioConfig {
        min_history_days: 40,
        ..PortfolioConfig::default()
    };
    let series = RebalanceScheduler::new(config).unwrap().run(&table);
    for entry in series.entries() {
        assert!(entry.excluded.contains(&"FLAT".to_string()));
        assert_eq!(entry.weights.get("FLAT"), 0.0);
    }
}

#[test]
fn all_declining_assets_fall_back_to_cash() {
    let n = 200;
    let table = table_with(vec![
        ("AAA", oscillating(n, 100.0, -0.002, 0.7)),
        ("BBB", oscillating(n, 60.0, -0.0025, 1.3)),
    ]);
    let config = PortfolioConfig {
        min_history_days: 40,
        risk_free_rate: 0.05,
        ..PortfolioConfig::default()
    };
    let series = RebalanceScheduler::new(config).unwrap().run(&table);
    assert!(!series.is_empty());
    for entry in series.entries() {
        assert_eq!(entry.outcome, RebalanceOutcome::Infeasible);
        assert!(entry.weights.is_zero());
    }
}

#[test]
fn slow_solver_times_out_and_holds_cash() {
    let config = PortfolioConfig {
        min_history_days: 40,
        solver_timeout_ms: Some(20),
        ..PortfolioConfig::default()
    };
    let scheduler = RebalanceScheduler::new(config)
        .unwrap()
        .with_solver(Arc::new(SlowSolver(Duration::from_millis(500))));
    // Two months past warm-up: keeps the number of slow workers small.
    let series = scheduler.run(&three_assets(80));
    assert!(!series.is_empty());
    for entry in series.entries() {
        assert_eq!(entry.outcome, RebalanceOutcome::TimedOut);
        assert!(entry.weights.is_zero());
    }
}

#[test]
fn fast_custom_solver_is_used_within_timeout() {
    let config = PortfolioConfig {
        min_history_days: 40,
        solver_timeout_ms: Some(5_000),
        ..PortfolioConfig::default()
    };
    let scheduler = RebalanceScheduler::new(config)
        .unwrap()
        .with_solver(Arc::new(SlowSolver(Duration::from_millis(1))));
    let series = scheduler.run(&three_assets(80));
    assert!(!series.is_empty());
    for entry in series.entries() {
        assert_eq!(entry.outcome, RebalanceOutcome::Optimized);
        assert!((entry.weights.get("AAA") - 1.0 / 3.0).abs() < 1e-9);
    }
}
