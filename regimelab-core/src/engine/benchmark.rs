//! Passive comparison portfolios run through the same engine.

use serde::{Deserialize, Serialize};

use super::{BacktestConfig, BacktestInput, RebalanceRule};
use crate::domain::TargetWeight;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Benchmark {
    /// 100% risky asset, never rebalanced.
    BuyAndHold,
    /// 60% risky / 40% defensive, rebalanced monthly.
    Balanced6040,
}

impl Benchmark {
    pub const ALL: [Benchmark; 2] = [Benchmark::BuyAndHold, Benchmark::Balanced6040];

    pub fn label(self) -> &'static str {
        match self {
            Benchmark::BuyAndHold => "buy_and_hold",
            Benchmark::Balanced6040 => "balanced_60_40",
        }
    }

    fn risky_weight(self) -> f64 {
        match self {
            Benchmark::BuyAndHold => 1.0,
            Benchmark::Balanced6040 => 0.6,
        }
    }

    fn rule(self) -> RebalanceRule {
        match self {
            Benchmark::BuyAndHold => RebalanceRule::Never,
            Benchmark::Balanced6040 => RebalanceRule::Monthly,
        }
    }
}

/// Benchmark input starting from the strategy's first signal date on the
/// same prices, so both runs share inception and trading days.
///
/// A single target is used: later strategy signals must not trigger
/// benchmark rebalances.
pub fn benchmark_input(benchmark: Benchmark, strategy: &BacktestInput) -> BacktestInput {
    let risky = benchmark.risky_weight();
    BacktestInput {
        targets: strategy
            .targets
            .first()
            .map(|t| TargetWeight::constant(t.date, risky))
            .into_iter()
            .collect(),
        risky: strategy.risky.clone(),
        defensive: strategy.defensive.clone(),
        config: BacktestConfig {
            rebalance: benchmark.rule(),
            ..strategy.config
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceSeries, Regime};
    use crate::engine::run_backtest;
    use chrono::{Datelike, NaiveDate};

    fn input() -> BacktestInput {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..60).map(|i| start + chrono::Duration::days(i)).collect();
        let risky = PriceSeries::from_pairs(
            "SPY",
            dates.iter().enumerate().map(|(i, &d)| (d, 100.0 * (1.0 + 0.002 * i as f64))),
        )
        .unwrap();
        let defensive = PriceSeries::from_pairs(
            "TLT",
            dates.iter().enumerate().map(|(i, &d)| (d, 50.0 * (1.0 - 0.001 * i as f64))),
        )
        .unwrap();
        BacktestInput {
            targets: vec![
                TargetWeight::from_regime(start, Regime::RiskOff),
                TargetWeight::from_regime(start + chrono::Duration::days(31), Regime::RiskOn),
            ],
            risky,
            defensive,
            config: BacktestConfig::default(),
        }
    }

    #[test]
    fn buy_and_hold_tracks_risky_asset() {
        let strategy = input();
        let out = run_backtest(&benchmark_input(Benchmark::BuyAndHold, &strategy)).unwrap();
        let first = strategy.risky.points()[0].price;
        let last = strategy.risky.points().last().unwrap().price;
        assert!((out.metrics.total_return - (last / first - 1.0)).abs() < 1e-9);
        assert_eq!(out.metrics.rebalance_count, 0);
        assert_eq!(out.metrics.total_transaction_cost, 0.0);
    }

    #[test]
    fn benchmarks_share_trading_days_with_strategy() {
        let strategy = input();
        let s = run_backtest(&strategy).unwrap();
        for bench in Benchmark::ALL {
            let b = run_backtest(&benchmark_input(bench, &strategy)).unwrap();
            assert_eq!(b.records.len(), s.records.len(), "{}", bench.label());
            assert_eq!(b.inception(), s.inception());
        }
    }

    #[test]
    fn balanced_rebalances_monthly() {
        let strategy = input();
        let out = run_backtest(&benchmark_input(Benchmark::Balanced6040, &strategy)).unwrap();
        // Jan 2 start; the Feb 1 strategy signal adds no rebalance of its own.
        assert_eq!(out.metrics.rebalance_count, 1);
        assert!(out.records.iter().filter(|r| r.rebalanced).all(|r| r.date.day() == 1));
        assert!(out.records.iter().all(|r| r.regime.is_none()));
    }
}
