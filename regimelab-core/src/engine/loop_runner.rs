//! The daily simulation loop.

use chrono::NaiveDate;

use super::state::PortfolioState;
use super::{BacktestConfig, BacktestError, BacktestInput, BacktestOutput, DailyRecord};
use crate::data::align::inner_join;
use crate::domain::{Diagnostic, PriceSeries, TargetWeight};
use crate::metrics::{MetricInputs, PerformanceMetrics};

/// Run one backtest from a self-contained input.
pub fn run_backtest(input: &BacktestInput) -> Result<BacktestOutput, BacktestError> {
    simulate(&input.targets, &input.risky, &input.defensive, &input.config)
}

fn validate_targets(targets: &[TargetWeight]) -> Result<(), BacktestError> {
    if targets.is_empty() {
        return Err(BacktestError::NoSignals);
    }
    if let Some(bad) = targets.iter().find(|t| !t.weights.is_valid()) {
        return Err(BacktestError::InvalidWeights {
            date: bad.date,
            risky: bad.weights.risky,
            defensive: bad.weights.defensive,
        });
    }
    if let Some(pair) = targets.windows(2).find(|w| w[1].date <= w[0].date) {
        return Err(BacktestError::UnorderedSignals {
            previous: pair[0].date,
            next: pair[1].date,
        });
    }
    Ok(())
}

/// Index of the latest target dated strictly before `date`, advancing from
/// `cursor`.
fn target_in_force(targets: &[TargetWeight], cursor: &mut usize, date: NaiveDate) -> Option<usize> {
    while *cursor < targets.len() && targets[*cursor].date < date {
        *cursor += 1;
    }
    cursor.checked_sub(1)
}

pub(crate) fn simulate(
    targets: &[TargetWeight],
    risky: &PriceSeries,
    defensive: &PriceSeries,
    config: &BacktestConfig,
) -> Result<BacktestOutput, BacktestError> {
    config.validate()?;
    validate_targets(targets)?;

    let prices = inner_join(risky, defensive);
    if prices.is_empty() {
        return Err(BacktestError::MisalignedSeries {
            risky: risky.symbol.clone(),
            defensive: defensive.symbol.clone(),
        });
    }
    let mut diagnostics = Vec::new();
    if prices.dropped > 0 {
        tracing::warn!(dropped = prices.dropped, "price dates without a match dropped");
        diagnostics.push(Diagnostic::MisalignedSeries {
            context: format!("{}/{}", risky.symbol, defensive.symbol),
            dropped: prices.dropped,
        });
    }

    let first_signal = targets[0].date;
    let no_days = BacktestError::NoTradingDays { after: first_signal };
    let effective = prices
        .dates
        .iter()
        .position(|d| *d > first_signal)
        .ok_or(no_days.clone())?;
    let inception = effective.saturating_sub(1);
    let first_day = inception + 1;
    if first_day >= prices.len() {
        return Err(no_days);
    }
    diagnostics.push(Diagnostic::EffectiveStart {
        date: prices.dates[first_day],
        skipped_days: inception,
    });

    let mut cursor = 0;
    let Some(mut current) = target_in_force(targets, &mut cursor, prices.dates[first_day]) else {
        return Err(no_days);
    };
    // Target behind the weights actually held.
    let mut traded = current;
    let mut state = PortfolioState::new(config.initial_capital, targets[current].weights);

    let mut records = Vec::with_capacity(prices.len() - inception);
    records.push(DailyRecord {
        date: prices.dates[inception],
        value: state.value,
        daily_return: 0.0,
        cumulative_return: 0.0,
        drawdown: 0.0,
        risky_weight: state.weights.risky,
        defensive_weight: state.weights.defensive,
        regime: targets[traded].regime,
        rebalanced: false,
        turnover: 0.0,
        cost: 0.0,
    });

    for i in first_day..prices.len() {
        if let Some(idx) = target_in_force(targets, &mut cursor, prices.dates[i]) {
            current = idx;
        }
        let due = config
            .rebalance
            .is_due(prices.dates[i - 1], prices.dates[i], current != traded);
        if due {
            traded = current;
        }
        let target = &targets[traded];

        let risky_return = prices.risky[i] / prices.risky[i - 1] - 1.0;
        let defensive_return = prices.defensive[i] / prices.defensive[i - 1] - 1.0;
        let outcome = state.step(
            risky_return,
            defensive_return,
            due.then_some(target.weights),
            config.cost_bps,
        );

        records.push(DailyRecord {
            date: prices.dates[i],
            value: state.value,
            daily_return: outcome.daily_return,
            cumulative_return: state.value / config.initial_capital - 1.0,
            drawdown: state.drawdown(),
            risky_weight: outcome.weights.risky,
            defensive_weight: outcome.weights.defensive,
            regime: target.regime,
            rebalanced: due,
            turnover: outcome.turnover,
            cost: outcome.cost,
        });
    }

    let returns: Vec<f64> = records.iter().skip(1).map(|r| r.daily_return).collect();
    let equity: Vec<f64> = records.iter().map(|r| r.value).collect();
    let (turnover, total_cost, rebalance_count) =
        (state.total_turnover, state.total_cost, state.rebalance_count);
    let period_returns = state.finish();

    let metrics = PerformanceMetrics::compute(&MetricInputs {
        returns: &returns,
        equity_curve: &equity,
        period_returns: &period_returns,
        turnover,
        total_transaction_cost: total_cost,
        rebalance_count,
        trading_days_per_year: f64::from(config.trading_days_per_year),
        risk_free_rate: config.risk_free_rate,
    });

    tracing::debug!(
        start = %prices.dates[inception],
        days = returns.len(),
        rebalances = rebalance_count,
        total_return = metrics.total_return,
        rule = config.rebalance.label(),
        "backtest complete"
    );

    Ok(BacktestOutput {
        records,
        metrics,
        period_returns,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Weekday};

    use super::*;
    use crate::domain::{AllocationWeights, Regime};
    use crate::engine::RebalanceRule;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn flat_prices(dates: &[NaiveDate]) -> (PriceSeries, PriceSeries) {
        (
            PriceSeries::from_pairs("SPY", dates.iter().map(|&d| (d, 100.0))).unwrap(),
            PriceSeries::from_pairs("TLT", dates.iter().map(|&d| (d, 50.0))).unwrap(),
        )
    }

    #[test]
    fn starts_day_after_first_signal_with_prior_close_as_inception() {
        let dates = [d(1, 2), d(1, 3), d(1, 4), d(1, 5)];
        let (spy, tlt) = flat_prices(&dates);
        let targets = [TargetWeight::from_regime(d(1, 3), Regime::RiskOn)];
        let out = simulate(&targets, &spy, &tlt, &BacktestConfig::default()).unwrap();
        assert_eq!(out.inception(), Some(d(1, 3)));
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.returns().len(), 2);
        assert!(out.diagnostics.contains(&Diagnostic::EffectiveStart {
            date: d(1, 4),
            skipped_days: 1
        }));
    }

    #[test]
    fn signal_before_all_prices_starts_at_first_price() {
        let dates = [d(1, 2), d(1, 3)];
        let (spy, tlt) = flat_prices(&dates);
        let targets = [TargetWeight::from_regime(d(1, 1), Regime::Neutral)];
        let out = simulate(&targets, &spy, &tlt, &BacktestConfig::default()).unwrap();
        assert_eq!(out.inception(), Some(d(1, 2)));
        assert_eq!(out.returns(), vec![0.0]);
    }

    #[test]
    fn signal_after_last_price_is_an_error() {
        let dates = [d(1, 2), d(1, 3)];
        let (spy, tlt) = flat_prices(&dates);
        let targets = [TargetWeight::from_regime(d(1, 3), Regime::Neutral)];
        let err = simulate(&targets, &spy, &tlt, &BacktestConfig::default()).unwrap_err();
        assert_eq!(err, BacktestError::NoTradingDays { after: d(1, 3) });
    }

    #[test]
    fn same_day_signal_is_not_used_that_day() {
        // Signal on 02-01 must only act from 02-02 onward.
        let dates = [d(1, 30), d(1, 31), d(2, 1), d(2, 2)];
        let (spy, tlt) = flat_prices(&dates);
        let targets = [
            TargetWeight::from_regime(d(1, 29), Regime::RiskOn),
            TargetWeight::from_regime(d(2, 1), Regime::RiskOff),
        ];
        let config = BacktestConfig {
            rebalance: RebalanceRule::OnSignal,
            ..BacktestConfig::default()
        };
        let out = simulate(&targets, &spy, &tlt, &config).unwrap();
        let on_feb_1 = out.records.iter().find(|r| r.date == d(2, 1)).unwrap();
        let on_feb_2 = out.records.iter().find(|r| r.date == d(2, 2)).unwrap();
        assert_eq!(on_feb_1.regime, Some(Regime::RiskOn));
        assert!(!on_feb_1.rebalanced);
        assert_eq!(on_feb_2.regime, Some(Regime::RiskOff));
        assert!(on_feb_2.rebalanced);
        assert!((on_feb_2.risky_weight - 0.2).abs() < 1e-12);
    }

    fn weekdays(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        from.iter_days()
            .take_while(|day| *day <= to)
            .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
            .collect()
    }

    fn record_on(out: &BacktestOutput, date: NaiveDate) -> &DailyRecord {
        out.records.iter().find(|r| r.date == date).unwrap()
    }

    #[test]
    fn monthly_rule_trades_month_start_signal_the_next_day() {
        // 2024-04-01 is a Monday, 2024-06-01 a Saturday.
        let dates = weekdays(d(2, 1), d(6, 28));
        let (spy, tlt) = flat_prices(&dates);
        let targets = [
            TargetWeight::from_regime(d(3, 1), Regime::RiskOn),
            TargetWeight::from_regime(d(4, 1), Regime::RiskOff),
            TargetWeight::from_regime(d(6, 1), Regime::RiskOn),
        ];
        let out = simulate(&targets, &spy, &tlt, &BacktestConfig::default()).unwrap();
        let risk_on = Regime::RiskOn.allocation().risky;
        let risk_off = Regime::RiskOff.allocation().risky;

        // Month boundary on 04-01 restores the March target; April's signal
        // is not yet in force.
        let apr_1 = record_on(&out, d(4, 1));
        assert_eq!(apr_1.regime, Some(Regime::RiskOn));
        assert!((apr_1.risky_weight - risk_on).abs() < 1e-12);

        let apr_2 = record_on(&out, d(4, 2));
        assert!(apr_2.rebalanced);
        assert_eq!(apr_2.regime, Some(Regime::RiskOff));
        assert!((apr_2.risky_weight - risk_off).abs() < 1e-12);

        let apr_30 = record_on(&out, d(4, 30));
        assert!(!apr_30.rebalanced);
        assert!((apr_30.risky_weight - risk_off).abs() < 1e-12);

        let jun_3 = record_on(&out, d(6, 3));
        assert!(jun_3.rebalanced);
        assert_eq!(jun_3.regime, Some(Regime::RiskOn));
        assert!((jun_3.risky_weight - risk_on).abs() < 1e-12);

        let rebalance_days: Vec<NaiveDate> =
            out.records.iter().filter(|r| r.rebalanced).map(|r| r.date).collect();
        assert_eq!(rebalance_days, vec![d(4, 1), d(4, 2), d(5, 1), d(6, 3)]);
    }

    #[test]
    fn weekly_rule_trades_a_signal_without_waiting_for_the_week() {
        let dates = weekdays(d(3, 4), d(3, 15));
        let (spy, tlt) = flat_prices(&dates);
        let targets = [
            TargetWeight::from_regime(d(3, 1), Regime::Neutral),
            // Tuesday: in force from Wednesday 03-06.
            TargetWeight::from_regime(d(3, 5), Regime::RiskOff),
        ];
        let config = BacktestConfig {
            rebalance: RebalanceRule::Weekly,
            ..BacktestConfig::default()
        };
        let out = simulate(&targets, &spy, &tlt, &config).unwrap();
        let mar_6 = record_on(&out, d(3, 6));
        assert!(mar_6.rebalanced);
        assert_eq!(mar_6.regime, Some(Regime::RiskOff));
    }

    #[test]
    fn regime_label_follows_held_weights() {
        let dates = weekdays(d(1, 1), d(3, 29));
        let (spy, tlt) = flat_prices(&dates);
        let targets = [
            TargetWeight::from_regime(d(1, 1), Regime::RiskOn),
            TargetWeight::from_regime(d(2, 1), Regime::RiskOff),
        ];
        let config = BacktestConfig {
            rebalance: RebalanceRule::Never,
            ..BacktestConfig::default()
        };
        let out = simulate(&targets, &spy, &tlt, &config).unwrap();
        let risk_on = Regime::RiskOn.allocation().risky;
        for record in &out.records {
            assert_eq!(record.regime, Some(Regime::RiskOn));
            assert!((record.risky_weight - risk_on).abs() < 1e-12);
        }
    }

    #[test]
    fn invalid_weights_fail_before_simulation() {
        let dates = [d(1, 2), d(1, 3)];
        let (spy, tlt) = flat_prices(&dates);
        let targets = [TargetWeight {
            date: d(1, 1),
            weights: AllocationWeights::new(0.6, 0.6),
            regime: None,
        }];
        let err = simulate(&targets, &spy, &tlt, &BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidWeights { .. }));
    }

    #[test]
    fn disjoint_prices_are_misaligned() {
        let spy = PriceSeries::from_pairs("SPY", [(d(1, 2), 1.0)]).unwrap();
        let tlt = PriceSeries::from_pairs("TLT", [(d(1, 3), 1.0)]).unwrap();
        let targets = [TargetWeight::constant(d(1, 1), 0.5)];
        let err = simulate(&targets, &spy, &tlt, &BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, BacktestError::MisalignedSeries { .. }));
    }

    #[test]
    fn unordered_targets_rejected() {
        let dates = [d(1, 2), d(1, 3)];
        let (spy, tlt) = flat_prices(&dates);
        let targets = [TargetWeight::constant(d(1, 2), 0.5), TargetWeight::constant(d(1, 1), 0.5)];
        let err = simulate(&targets, &spy, &tlt, &BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, BacktestError::UnorderedSignals { .. }));
    }

    #[test]
    fn negative_cost_rejected() {
        let config = BacktestConfig {
            cost_bps: -1.0,
            ..BacktestConfig::default()
        };
        assert!(matches!(config.validate(), Err(BacktestError::InvalidConfig(_))));
    }
}
