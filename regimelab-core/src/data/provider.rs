//! Source traits and structured error types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{IndicatorSeries, PriceSeries, SeriesError};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: ::csv::Error,
    },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: String, column: String },

    #[error("{path} line {line}: {message}")]
    Parse {
        path: String,
        line: u64,
        message: String,
    },

    #[error("indicator '{name}' not available")]
    UnknownIndicator { name: String },

    #[error("no data for '{name}' in the requested range")]
    Empty { name: String },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    CsvImport,
    Synthetic,
}

/// Inclusive date bounds; `None` is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Supplies named macro indicator series.
pub trait IndicatorSource {
    fn source(&self) -> DataSource;

    /// One series per requested name, in request order.
    fn fetch_indicators(
        &self,
        names: &[String],
        range: DateRange,
    ) -> Result<Vec<IndicatorSeries>, DataError>;
}

/// Supplies daily prices for the risky and the defensive asset.
///
/// Implementations align both series onto common trading days before
/// returning them.
pub trait PriceSource {
    fn source(&self) -> DataSource;

    fn fetch_prices(
        &self,
        risky: &str,
        defensive: &str,
        range: DateRange,
    ) -> Result<(PriceSeries, PriceSeries), DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_is_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let r = DateRange::new(Some(d(2)), Some(d(4)));
        assert!(!r.contains(d(1)));
        assert!(r.contains(d(2)));
        assert!(r.contains(d(4)));
        assert!(!r.contains(d(5)));
        assert!(DateRange::default().contains(d(31)));
    }
}
