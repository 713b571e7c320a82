//! Statistical validation of a completed strategy backtest.
//!
//! Four independent checks, each a read-only consumer of backtest outputs:
//! walk-forward persistence, a Newey-West test of mean excess return, a
//! paired bootstrap of the drawdown difference against a benchmark, and a
//! Welch test of RiskOn versus RiskOff daily returns. A check that cannot be
//! computed reports `NotApplicable` without affecting the others.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use regimelab_core::domain::Regime;
use regimelab_core::engine::{benchmark_input, Benchmark};
use regimelab_core::{BacktestError, BacktestInput, BacktestOutput};

use crate::bootstrap::{drawdown_difference_test, BootstrapConfig, DrawdownBootstrap};
use crate::stats::{newey_west_test, welch_t_test, NeweyWestTest, TestOutcome, WelchTest};
use crate::walk_forward::{walk_forward, WalkForwardResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub bootstrap: BootstrapConfig,
    /// Newey-West lag count; `None` uses the rule-of-thumb default.
    pub newey_west_lags: Option<usize>,
    /// Portfolio the drawdown test compares against.
    pub benchmark: Benchmark,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            bootstrap: BootstrapConfig::default(),
            newey_west_lags: None,
            benchmark: Benchmark::BuyAndHold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub walk_forward: TestOutcome<WalkForwardResult>,
    pub newey_west: TestOutcome<NeweyWestTest>,
    pub drawdown_bootstrap: TestOutcome<DrawdownBootstrap>,
    /// Group a is RiskOn days, group b is RiskOff days.
    pub regime_welch: TestOutcome<WelchTest>,
}

#[derive(Debug, Clone, Default)]
pub struct StatisticalValidator {
    config: ValidationConfig,
}

impl StatisticalValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Backtest the full input and its benchmark with `backtest_fn`, then run
    /// every check. Only a failure of the full-period strategy run is an error.
    pub fn validate<F>(
        &self,
        backtest_fn: F,
        input: &BacktestInput,
        split_date: Option<NaiveDate>,
    ) -> Result<ValidationResult, BacktestError>
    where
        F: Fn(&BacktestInput) -> Result<BacktestOutput, BacktestError>,
    {
        let strategy = backtest_fn(input)?;
        let benchmark = backtest_fn(&benchmark_input(self.config.benchmark, input));
        Ok(self.validate_runs(&backtest_fn, input, &strategy, benchmark.as_ref(), split_date))
    }

    /// Run every check against full-period runs the caller already has.
    ///
    /// `strategy` and `benchmark` must come from `input` and
    /// `benchmark_input(config.benchmark, input)`. `backtest_fn` is only
    /// called for the walk-forward segments.
    pub fn validate_runs<F>(
        &self,
        backtest_fn: &F,
        input: &BacktestInput,
        strategy: &BacktestOutput,
        benchmark: Result<&BacktestOutput, &BacktestError>,
        split_date: Option<NaiveDate>,
    ) -> ValidationResult
    where
        F: Fn(&BacktestInput) -> Result<BacktestOutput, BacktestError>,
    {
        let walk_forward = match split_date {
            Some(split) => TestOutcome::Computed(walk_forward(backtest_fn, input, split)),
            None => TestOutcome::not_applicable("no split date"),
        };
        let daily_risk_free =
            input.config.risk_free_rate / f64::from(input.config.trading_days_per_year);

        let result = ValidationResult {
            walk_forward,
            newey_west: newey_west_test(
                &strategy.returns(),
                daily_risk_free,
                self.config.newey_west_lags,
            ),
            drawdown_bootstrap: self.drawdown_test(strategy, benchmark),
            regime_welch: regime_welch_test(strategy),
        };

        tracing::info!(
            walk_forward = result.walk_forward.is_computed(),
            newey_west = result.newey_west.is_computed(),
            drawdown_bootstrap = result.drawdown_bootstrap.is_computed(),
            regime_welch = result.regime_welch.is_computed(),
            "validation complete"
        );
        result
    }

    fn drawdown_test(
        &self,
        strategy: &BacktestOutput,
        benchmark: Result<&BacktestOutput, &BacktestError>,
    ) -> TestOutcome<DrawdownBootstrap> {
        let benchmark = match benchmark {
            Ok(output) => output,
            Err(e) => {
                return TestOutcome::not_applicable(format!(
                    "{} benchmark failed: {e}",
                    self.config.benchmark.label()
                ))
            }
        };
        match drawdown_difference_test(
            &strategy.returns(),
            &benchmark.returns(),
            &self.config.bootstrap,
        ) {
            Ok(result) => TestOutcome::Computed(result),
            Err(e) => TestOutcome::not_applicable(e.to_string()),
        }
    }
}

/// Welch test of daily strategy returns on RiskOn days against RiskOff days.
pub fn regime_welch_test(output: &BacktestOutput) -> TestOutcome<WelchTest> {
    let mut risk_on = Vec::new();
    let mut risk_off = Vec::new();
    for (regime, r) in output.regime_returns() {
        match regime {
            Some(Regime::RiskOn) => risk_on.push(r),
            Some(Regime::RiskOff) => risk_off.push(r),
            Some(Regime::Neutral) | None => {}
        }
    }
    welch_t_test(&risk_on, &risk_off)
}
