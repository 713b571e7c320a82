//! Non-fatal data-shape notes reported alongside results.
//!
//! Truncated or degenerate data does not abort a run. Each stage records what
//! it dropped or resolved so reports can show the usable range.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Leading points without a full rolling window.
    InsufficientHistory {
        indicator: String,
        warmup_points: usize,
    },
    /// Zero-variance windows resolved as a zero surprise.
    DegenerateVariance { indicator: String, windows: usize },
    /// Dates dropped because another series had no matching timestamp.
    MisalignedSeries { context: String, dropped: usize },
    /// First trading day on which a signal is in force.
    EffectiveStart {
        date: NaiveDate,
        skipped_days: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::InsufficientHistory {
                indicator,
                warmup_points,
            } => write!(f, "{indicator}: {warmup_points} warm-up points without a full window"),
            Diagnostic::DegenerateVariance { indicator, windows } => {
                write!(f, "{indicator}: {windows} zero-variance windows set to zero surprise")
            }
            Diagnostic::MisalignedSeries { context, dropped } => {
                write!(f, "{context}: {dropped} unmatched dates dropped")
            }
            Diagnostic::EffectiveStart { date, skipped_days } => {
                write!(f, "effective start {date} ({skipped_days} price days before first signal)")
            }
        }
    }
}
