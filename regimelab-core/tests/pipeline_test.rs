//! End-to-end core pipeline on synthetic data: indicators → surprises →
//! composite signal → strategy backtest and benchmarks.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use regimelab_core::data::{resample_monthly_mean, DateRange, IndicatorSource, PriceSource, SyntheticSource};
use regimelab_core::domain::{IndicatorSeries, SurpriseSeries};
use regimelab_core::engine::{benchmark_input, run_backtest, BacktestConfig, BacktestInput, Benchmark};
use regimelab_core::smoothing::SmoothingMethod;
use regimelab_core::{RegimeThresholds, SignalGenerator, SurpriseCalculator};

fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2012, 1, 1),
        NaiveDate::from_ymd_opt(2019, 12, 31),
    )
}

fn surprises(source: &SyntheticSource) -> Vec<SurpriseSeries> {
    let names: Vec<String> = ["UNRATE", "CIVPART", "PAYEMS", "ICSA"].iter().map(|s| s.to_string()).collect();
    let raw = source.fetch_indicators(&names, range()).unwrap();
    let calc = SurpriseCalculator::new(12).unwrap();
    raw.iter()
        .map(|series| {
            let (prepared, negate): (IndicatorSeries, bool) = match series.name.as_str() {
                "UNRATE" => (series.clone(), true),
                "PAYEMS" => (series.difference(), false),
                "ICSA" => (resample_monthly_mean(series), true),
                _ => (series.clone(), false),
            };
            calc.compute(&prepared, negate).unwrap()
        })
        .collect()
}

fn generator(method: SmoothingMethod) -> SignalGenerator {
    let weights: BTreeMap<String, f64> = [("UNRATE", 0.4), ("ICSA", 0.3), ("PAYEMS", 0.2), ("CIVPART", 0.1)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    SignalGenerator::new(weights, method.build().unwrap(), RegimeThresholds::symmetric(0.5).unwrap()).unwrap()
}

#[test]
fn synthetic_pipeline_produces_consistent_backtest() {
    let source = SyntheticSource::new(42);
    let signal = generator(SmoothingMethod::default()).generate(&surprises(&source)).unwrap();

    // 96 months; payroll differencing and the 12-month window cost 12 months,
    // the 3-month average another 2.
    assert_eq!(signal.len(), 84);
    assert_eq!(signal.target_weights().len(), 82);
    let summary = signal.regime_summary();
    assert_eq!(summary.risk_on + summary.neutral + summary.risk_off, summary.total);

    let (spy, tlt) = source.fetch_prices("SPY", "TLT", range()).unwrap();
    let input = BacktestInput {
        targets: signal.target_weights(),
        risky: spy,
        defensive: tlt,
        config: BacktestConfig::default(),
    };
    let out = run_backtest(&input).unwrap();

    assert!(out.inception().unwrap() <= signal.target_weights()[0].date + chrono::Duration::days(3));
    for rec in &out.records {
        assert!((rec.risky_weight + rec.defensive_weight - 1.0).abs() < 1e-9);
        assert!(rec.drawdown <= 0.0);
        assert!(rec.cost >= 0.0);
    }
    assert!(out.metrics.max_drawdown < 0.0);
    assert!(out.metrics.sharpe.is_some());
    assert!(out.metrics.rebalance_count > 0);
    assert!(out.metrics.win_rate.is_some());
    let paid: f64 = out.records.iter().map(|r| r.cost).sum();
    assert!((paid - out.metrics.total_transaction_cost).abs() < 1e-6);

    for bench in Benchmark::ALL {
        let b = run_backtest(&benchmark_input(bench, &input)).unwrap();
        assert_eq!(b.records.first().map(|r| r.date), out.records.first().map(|r| r.date));
        assert_eq!(b.records.len(), out.records.len());
    }
}

#[test]
fn kalman_signal_has_no_warmup() {
    let source = SyntheticSource::new(7);
    let signal = generator(SmoothingMethod::kalman_defaults())
        .generate(&surprises(&source))
        .unwrap();
    assert!(signal.points.iter().all(|p| p.regime.is_some()));
    assert_eq!(signal.smoother, "kalman");
}
