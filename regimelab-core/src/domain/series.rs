//! Dated series exchanged between pipeline stages.
//!
//! Every series carries strictly increasing dates. Construction validates
//! ordering once so downstream stages can rely on it without re-checking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Diagnostic;

/// Errors raised when a series violates its shape invariants.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("series '{name}': dates not strictly increasing ({previous} then {next})")]
    Unordered {
        name: String,
        previous: NaiveDate,
        next: NaiveDate,
    },
    #[error("series '{name}': price on {date} must be finite and positive, got {price}")]
    InvalidPrice {
        name: String,
        date: NaiveDate,
        price: f64,
    },
}

fn check_ordering<'a>(
    name: &str,
    dates: impl Iterator<Item = &'a NaiveDate>,
) -> Result<(), SeriesError> {
    let mut previous: Option<NaiveDate> = None;
    for &date in dates {
        if let Some(prev) = previous {
            if date <= prev {
                return Err(SeriesError::Unordered {
                    name: name.to_string(),
                    previous: prev,
                    next: date,
                });
            }
        }
        previous = Some(date);
    }
    Ok(())
}

// ─── Indicator series ────────────────────────────────────────────────

/// One dated observation of a macro indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Raw observations of one named macro indicator, typically monthly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub name: String,
    observations: Vec<Observation>,
}

impl IndicatorSeries {
    pub fn new(name: impl Into<String>, observations: Vec<Observation>) -> Result<Self, SeriesError> {
        let name = name.into();
        check_ordering(&name, observations.iter().map(|o| &o.date))?;
        Ok(Self { name, observations })
    }

    pub fn from_pairs(
        name: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, SeriesError> {
        let observations = pairs
            .into_iter()
            .map(|(date, value)| Observation { date, value })
            .collect();
        Self::new(name, observations)
    }

    /// Observations already known to be strictly ordered.
    pub(crate) fn from_ordered(name: String, observations: Vec<Observation>) -> Self {
        Self { name, observations }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.observations
            .binary_search_by_key(&date, |o| o.date)
            .ok()
            .map(|i| self.observations[i].value)
    }

    /// Period-over-period change. The first observation has no predecessor
    /// and is dropped.
    pub fn difference(&self) -> IndicatorSeries {
        let observations = self
            .observations
            .windows(2)
            .map(|w| Observation {
                date: w[1].date,
                value: w[1].value - w[0].value,
            })
            .collect();
        IndicatorSeries {
            name: self.name.clone(),
            observations,
        }
    }
}

// ─── Surprise series ─────────────────────────────────────────────────

/// Z-score at one date. `None` means insufficient history, not "no surprise".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurprisePoint {
    pub date: NaiveDate,
    pub z: Option<f64>,
}

/// Sign-adjusted rolling z-scores of one indicator.
///
/// Same length and dates as the source series; positive always means a
/// risk-on surprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurpriseSeries {
    pub name: String,
    pub window: usize,
    pub points: Vec<SurprisePoint>,
    /// Full windows whose variance was zero and were resolved to `0.0`.
    pub degenerate_windows: usize,
}

impl SurpriseSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with a full window.
    pub fn defined(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().filter_map(|p| p.z.map(|z| (p.date, z)))
    }

    pub fn defined_count(&self) -> usize {
        self.points.iter().filter(|p| p.z.is_some()).count()
    }

    pub fn at(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .and_then(|i| self.points[i].z)
    }

    /// Warm-up and degenerate-window notes for this series.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        let warmup_points = self.points.iter().take_while(|p| p.z.is_none()).count();
        if warmup_points > 0 {
            out.push(Diagnostic::InsufficientHistory {
                indicator: self.name.clone(),
                warmup_points,
            });
        }
        if self.degenerate_windows > 0 {
            out.push(Diagnostic::DegenerateVariance {
                indicator: self.name.clone(),
                windows: self.degenerate_windows,
            });
        }
        out
    }
}

// ─── Price series ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Daily prices of one traded instrument. Prices are finite and positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        check_ordering(&symbol, points.iter().map(|p| &p.date))?;
        if let Some(bad) = points
            .iter()
            .find(|p| !p.price.is_finite() || p.price <= 0.0)
        {
            return Err(SeriesError::InvalidPrice {
                name: symbol,
                date: bad.date,
                price: bad.price,
            });
        }
        Ok(Self { symbol, points })
    }

    pub fn from_pairs(
        symbol: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, SeriesError> {
        let points = pairs
            .into_iter()
            .map(|(date, price)| PricePoint { date, price })
            .collect();
        Self::new(symbol, points)
    }

    /// Points already known to be ordered with valid prices.
    pub(crate) fn from_validated(symbol: String, points: Vec<PricePoint>) -> Self {
        Self { symbol, points }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Sub-series with dates in `[start, end)`; `None` bounds are open.
    pub fn slice(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> PriceSeries {
        let points = self
            .points
            .iter()
            .filter(|p| start.map_or(true, |s| p.date >= s) && end.map_or(true, |e| p.date < e))
            .copied()
            .collect();
        PriceSeries {
            symbol: self.symbol.clone(),
            points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn indicator_rejects_unordered_dates() {
        let result = IndicatorSeries::from_pairs("UNRATE", [(d(2024, 2, 1), 4.0), (d(2024, 1, 1), 4.1)]);
        assert!(matches!(result, Err(SeriesError::Unordered { .. })));
    }

    #[test]
    fn indicator_rejects_duplicate_dates() {
        let result = IndicatorSeries::from_pairs("UNRATE", [(d(2024, 1, 1), 4.0), (d(2024, 1, 1), 4.1)]);
        assert!(result.is_err());
    }

    #[test]
    fn difference_drops_first_point() {
        let s = IndicatorSeries::from_pairs(
            "PAYEMS",
            [(d(2024, 1, 1), 100.0), (d(2024, 2, 1), 103.0), (d(2024, 3, 1), 101.0)],
        )
        .unwrap();
        let diff = s.difference();
        assert_eq!(diff.len(), 2);
        assert_eq!(diff.observations()[0].date, d(2024, 2, 1));
        assert!((diff.observations()[0].value - 3.0).abs() < 1e-12);
        assert!((diff.observations()[1].value + 2.0).abs() < 1e-12);
    }

    #[test]
    fn price_rejects_non_positive() {
        let result = PriceSeries::from_pairs("SPY", [(d(2024, 1, 2), 100.0), (d(2024, 1, 3), 0.0)]);
        assert!(matches!(result, Err(SeriesError::InvalidPrice { .. })));
    }

    #[test]
    fn price_slice_is_half_open() {
        let s = PriceSeries::from_pairs(
            "SPY",
            [(d(2024, 1, 2), 1.0), (d(2024, 1, 3), 2.0), (d(2024, 1, 4), 3.0)],
        )
        .unwrap();
        let sliced = s.slice(Some(d(2024, 1, 3)), Some(d(2024, 1, 4)));
        assert_eq!(sliced.len(), 1);
        assert_eq!(sliced.points()[0].price, 2.0);
    }
}
