//! Backtest engine — daily two-asset simulation against dated target weights.
//!
//! The engine inner-joins the two price series, starts on the first trading
//! day strictly after the first signal, and scans day by day:
//!
//! 1. Resolve the target in force (latest signal dated strictly before today)
//! 2. On a scheduled rebalance day, or the first day a new target is in
//!    force, charge turnover cost and reset weights
//! 3. Accrue close-to-close asset returns and let the weights drift
//! 4. Record value, drawdown and the weights held

pub mod benchmark;
pub mod loop_runner;
pub mod schedule;
pub mod state;

pub use benchmark::{benchmark_input, Benchmark};
pub use loop_runner::run_backtest;
pub use schedule::RebalanceRule;
pub use state::{DayOutcome, PortfolioState};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Diagnostic, PriceSeries, Regime, TargetWeight};
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("invalid backtest configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid allocation on {date}: risky {risky}, defensive {defensive}")]
    InvalidWeights {
        date: NaiveDate,
        risky: f64,
        defensive: f64,
    },
    #[error("no target weights supplied")]
    NoSignals,
    #[error("target weights out of order ({previous} then {next})")]
    UnorderedSignals { previous: NaiveDate, next: NaiveDate },
    #[error("price series {risky} and {defensive} share no dates")]
    MisalignedSeries { risky: String, defensive: String },
    #[error("no trading day after first signal on {after}")]
    NoTradingDays { after: NaiveDate },
}

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub cost_bps: f64,
    pub rebalance: RebalanceRule,
    pub trading_days_per_year: u32,
    /// Annual rate as a fraction (0.02 = 2%).
    pub risk_free_rate: f64,
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            cost_bps: 5.0,
            rebalance: RebalanceRule::Monthly,
            trading_days_per_year: 252,
            risk_free_rate: 0.0,
            initial_capital: 100_000.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !(self.cost_bps.is_finite() && self.cost_bps >= 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "cost_bps must be finite and >= 0, got {}",
                self.cost_bps
            )));
        }
        if self.trading_days_per_year == 0 {
            return Err(BacktestError::InvalidConfig(
                "trading_days_per_year must be > 0".into(),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::InvalidConfig(format!(
                "risk_free_rate must be finite, got {}",
                self.risk_free_rate
            )));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "initial_capital must be finite and > 0, got {}",
                self.initial_capital
            )));
        }
        Ok(())
    }
}

// ─── Input / output ──────────────────────────────────────────────────

/// Everything one backtest run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestInput {
    pub targets: Vec<TargetWeight>,
    pub risky: PriceSeries,
    pub defensive: PriceSeries,
    pub config: BacktestConfig,
}

/// One simulated trading day. The first record is the inception close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub value: f64,
    pub daily_return: f64,
    pub cumulative_return: f64,
    pub drawdown: f64,
    pub risky_weight: f64,
    pub defensive_weight: f64,
    /// Regime of the target last traded, i.e. the allocation being held.
    pub regime: Option<Regime>,
    pub rebalanced: bool,
    pub turnover: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutput {
    pub records: Vec<DailyRecord>,
    pub metrics: PerformanceMetrics,
    /// Compounded return of each rebalance-to-rebalance period.
    pub period_returns: Vec<f64>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BacktestOutput {
    /// Daily returns after inception.
    pub fn returns(&self) -> Vec<f64> {
        self.records.iter().skip(1).map(|r| r.daily_return).collect()
    }

    pub fn equity_curve(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.value).collect()
    }

    /// Daily returns after inception paired with the regime held that day.
    pub fn regime_returns(&self) -> impl Iterator<Item = (Option<Regime>, f64)> + '_ {
        self.records.iter().skip(1).map(|r| (r.regime, r.daily_return))
    }

    pub fn inception(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }
}

/// Engine bound to one configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(
        &self,
        targets: &[TargetWeight],
        risky: &PriceSeries,
        defensive: &PriceSeries,
    ) -> Result<BacktestOutput, BacktestError> {
        loop_runner::simulate(targets, risky, defensive, &self.config)
    }
}
