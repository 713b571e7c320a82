//! RegimeLab Core — employment-surprise signal and two-asset backtest.
//!
//! This crate contains the computational pipeline:
//! - Domain types (dated series, regimes, allocation weights, diagnostics)
//! - Rolling z-score surprises per indicator
//! - Composite index with pluggable smoothing and regime classification
//! - Daily two-asset backtest engine with rebalance rules and turnover cost
//! - Performance metrics
//! - Indicator and price sources (CSV, synthetic)

pub mod data;
pub mod domain;
pub mod engine;
pub mod metrics;
pub mod signal;
pub mod smoothing;
pub mod surprise;

pub use engine::{
    run_backtest, BacktestConfig, BacktestEngine, BacktestError, BacktestInput, BacktestOutput,
    DailyRecord, RebalanceRule,
};
pub use metrics::PerformanceMetrics;
pub use signal::{CompositePoint, CompositeSignal, RegimeSummary, RegimeThresholds, SignalError, SignalGenerator};
pub use smoothing::{KalmanSmoother, MovingAverage, Smoother, SmoothingMethod};
pub use surprise::{SurpriseCalculator, SurpriseError};
