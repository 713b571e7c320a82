//! Walk-forward validation — one chronological split, no re-fitting.
//!
//! The full input is partitioned at a split date and each segment is
//! backtested independently with the same weights and thresholds:
//!
//! - In-sample: prices strictly before the split, signals strictly before it
//! - Out-of-sample: prices on or after the split, signals on or after it plus
//!   the latest pre-split signal carried in, so the segment is invested from
//!   its first close
//!
//! This checks persistence of a fixed strategy, not retraining.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::domain::Diagnostic;
use regimelab_core::{BacktestError, BacktestInput, BacktestOutput, PerformanceMetrics};

use crate::stats::TestOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    InSample,
    OutOfSample,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::InSample => write!(f, "in-sample"),
            Segment::OutOfSample => write!(f, "out-of-sample"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("{segment} segment has no prices")]
    EmptyPrices { segment: Segment },
    #[error("{segment} segment has no signals")]
    NoSignals { segment: Segment },
    #[error("backtest failed on {segment} segment: {source}")]
    BacktestFailed {
        segment: Segment,
        #[source]
        source: BacktestError,
    },
}

// ─── Result types ────────────────────────────────────────────────────

/// Backtest summary of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub segment: Segment,
    pub inception: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub metrics: PerformanceMetrics,
    pub diagnostics: Vec<Diagnostic>,
}

impl SegmentResult {
    fn from_output(segment: Segment, output: BacktestOutput) -> Self {
        Self {
            segment,
            inception: output.inception(),
            end: output.last_date(),
            metrics: output.metrics,
            diagnostics: output.diagnostics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub split_date: NaiveDate,
    pub in_sample: TestOutcome<SegmentResult>,
    pub out_of_sample: TestOutcome<SegmentResult>,
    /// Out-of-sample minus in-sample Sharpe, when both are defined.
    pub sharpe_gap: Option<f64>,
}

// ─── Partitioning ────────────────────────────────────────────────────

/// The backtest input for one side of `split_date`.
pub fn partition(
    input: &BacktestInput,
    split_date: NaiveDate,
    segment: Segment,
) -> Result<BacktestInput, WalkForwardError> {
    let (risky, defensive, targets) = match segment {
        Segment::InSample => (
            input.risky.slice(None, Some(split_date)),
            input.defensive.slice(None, Some(split_date)),
            input
                .targets
                .iter()
                .filter(|t| t.date < split_date)
                .copied()
                .collect::<Vec<_>>(),
        ),
        Segment::OutOfSample => {
            let carried = input.targets.iter().rev().find(|t| t.date < split_date);
            let targets = carried
                .into_iter()
                .chain(input.targets.iter().filter(|t| t.date >= split_date))
                .copied()
                .collect::<Vec<_>>();
            (
                input.risky.slice(Some(split_date), None),
                input.defensive.slice(Some(split_date), None),
                targets,
            )
        }
    };

    if risky.is_empty() || defensive.is_empty() {
        return Err(WalkForwardError::EmptyPrices { segment });
    }
    if targets.is_empty() {
        return Err(WalkForwardError::NoSignals { segment });
    }
    Ok(BacktestInput {
        targets,
        risky,
        defensive,
        config: input.config,
    })
}

/// Partition and backtest one segment.
pub fn run_segment<F>(
    backtest_fn: &F,
    input: &BacktestInput,
    split_date: NaiveDate,
    segment: Segment,
) -> Result<SegmentResult, WalkForwardError>
where
    F: Fn(&BacktestInput) -> Result<BacktestOutput, BacktestError>,
{
    let part = partition(input, split_date, segment)?;
    let output =
        backtest_fn(&part).map_err(|source| WalkForwardError::BacktestFailed { segment, source })?;
    tracing::debug!(
        %segment,
        days = output.metrics.trading_days,
        sharpe = ?output.metrics.sharpe,
        "walk-forward segment complete"
    );
    Ok(SegmentResult::from_output(segment, output))
}

/// Run both segments. A segment that cannot be backtested is reported as
/// not applicable; the other still runs.
pub fn walk_forward<F>(backtest_fn: &F, input: &BacktestInput, split_date: NaiveDate) -> WalkForwardResult
where
    F: Fn(&BacktestInput) -> Result<BacktestOutput, BacktestError>,
{
    let outcome = |segment: Segment| match run_segment(backtest_fn, input, split_date, segment) {
        Ok(result) => TestOutcome::Computed(result),
        Err(e) => {
            tracing::warn!(%segment, error = %e, "walk-forward segment not applicable");
            TestOutcome::not_applicable(e.to_string())
        }
    };
    let in_sample = outcome(Segment::InSample);
    let out_of_sample = outcome(Segment::OutOfSample);

    let sharpe_gap = match (in_sample.computed(), out_of_sample.computed()) {
        (Some(is), Some(oos)) => match (is.metrics.sharpe, oos.metrics.sharpe) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        },
        _ => None,
    };

    WalkForwardResult {
        split_date,
        in_sample,
        out_of_sample,
        sharpe_gap,
    }
}
