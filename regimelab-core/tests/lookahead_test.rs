//! Look-ahead contamination tests across the pipeline.
//!
//! Method: compute on a truncated input and on the full input (with the tail
//! perturbed), then assert the overlapping prefix is identical. Any
//! difference means a stage is leaking future data into past values.

use chrono::{Duration, NaiveDate};
use regimelab_core::domain::{IndicatorSeries, PriceSeries, Regime, TargetWeight};
use regimelab_core::engine::{BacktestConfig, BacktestEngine, RebalanceRule};
use regimelab_core::smoothing::SmoothingMethod;
use regimelab_core::SurpriseCalculator;

fn month(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap() + chrono::Months::new(i as u32)
}

/// Deterministic pseudo-random walk using a simple LCG.
fn walk(n: usize, salt: u64) -> Vec<f64> {
    let mut level = 100.0;
    (0..n)
        .map(|i| {
            let seed = (i as u64 ^ salt).wrapping_mul(6364136223846793005).wrapping_add(1);
            level += ((seed >> 33) % 200) as f64 / 100.0 - 1.0;
            level
        })
        .collect()
}

#[test]
fn surprise_prefix_is_stable() {
    let full_values = walk(120, 7);
    let calc = SurpriseCalculator::new(12).unwrap();
    for cut in [12, 30, 77, 119] {
        let mut perturbed = full_values.clone();
        for v in perturbed.iter_mut().skip(cut) {
            *v *= 3.0;
        }
        let series = |vals: &[f64]| {
            IndicatorSeries::from_pairs("X", vals.iter().enumerate().map(|(i, &v)| (month(i), v))).unwrap()
        };
        let truncated = calc.compute(&series(&full_values[..cut]), true).unwrap();
        let full = calc.compute(&series(&perturbed), true).unwrap();
        assert_eq!(truncated.points[..], full.points[..cut], "cut {cut}");
    }
}

#[test]
fn differenced_surprise_prefix_is_stable() {
    let values = walk(60, 3);
    let calc = SurpriseCalculator::new(6).unwrap();
    let series = |vals: &[f64]| {
        IndicatorSeries::from_pairs("PAYEMS", vals.iter().enumerate().map(|(i, &v)| (month(i), v)))
            .unwrap()
            .difference()
    };
    let truncated = calc.compute(&series(&values[..40]), false).unwrap();
    let full = calc.compute(&series(&values), false).unwrap();
    assert_eq!(truncated.points[..], full.points[..truncated.len()]);
}

#[test]
fn smoothers_prefix_is_stable() {
    let raw: Vec<f64> = walk(80, 11).iter().map(|v| (v - 100.0) / 5.0).collect();
    for method in [
        SmoothingMethod::MovingAverage { window: 3 },
        SmoothingMethod::MovingAverage { window: 6 },
        SmoothingMethod::kalman_defaults(),
    ] {
        let smoother = method.build().unwrap();
        let full = smoother.smooth(&raw);
        let truncated = smoother.smooth(&raw[..50]);
        assert_eq!(truncated[..], full[..50], "{}", smoother.name());
    }
}

#[test]
fn backtest_records_ignore_future_prices_and_signals() {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let dates: Vec<NaiveDate> = (0..300).map(|i| start + Duration::days(i)).collect();
    let spy_prices = walk(300, 1);
    let tlt_prices: Vec<f64> = walk(300, 2).iter().map(|v| v / 2.0).collect();

    let targets: Vec<TargetWeight> = (0..10)
        .map(|m| {
            let regime = [Regime::RiskOn, Regime::RiskOff, Regime::Neutral][m % 3];
            TargetWeight::from_regime(start + chrono::Months::new(m as u32), regime)
        })
        .collect();

    let cut = 200;
    let cut_date = dates[cut];
    let engine = BacktestEngine::new(BacktestConfig {
        rebalance: RebalanceRule::Monthly,
        ..BacktestConfig::default()
    })
    .unwrap();

    let series = |sym: &str, prices: &[f64], n: usize| {
        PriceSeries::from_pairs(sym, dates[..n].iter().copied().zip(prices[..n].iter().copied())).unwrap()
    };

    // Truncated: prices up to the cut, signals strictly before it.
    let early_targets: Vec<TargetWeight> = targets.iter().copied().filter(|t| t.date < cut_date).collect();
    let truncated = engine
        .run(&early_targets, &series("SPY", &spy_prices, cut + 1), &series("TLT", &tlt_prices, cut + 1))
        .unwrap();

    // Full: future prices shocked, future signals flipped.
    let mut shocked_spy = spy_prices.clone();
    for p in shocked_spy.iter_mut().skip(cut + 1) {
        *p *= 0.5;
    }
    let mut future_targets = targets.clone();
    for t in future_targets.iter_mut().filter(|t| t.date >= cut_date) {
        *t = TargetWeight::from_regime(t.date, Regime::RiskOn);
    }
    let full = engine
        .run(&future_targets, &series("SPY", &shocked_spy, 300), &series("TLT", &tlt_prices, 300))
        .unwrap();

    let n = truncated.records.len();
    assert_eq!(truncated.records[..], full.records[..n]);
}
