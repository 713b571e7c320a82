//! Seeded synthetic data for demos and tests.
//!
//! Employment indicators are random walks around plausible levels, jobless
//! claims are weekly noise, and the defensive asset is negatively correlated
//! with the risky one. Every series draws from its own RNG seeded by hashing
//! `(seed, name)`, so requesting a subset never changes the values.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, DataSource, DateRange, IndicatorSource, PriceSource};
use crate::domain::{IndicatorSeries, PriceSeries};

/// Names of the indicators the synthetic source can produce.
pub const DEFAULT_INDICATORS: [&str; 4] = ["UNRATE", "CIVPART", "PAYEMS", "ICSA"];

const DEFAULT_START: (i32, u32, u32) = (2010, 1, 1);
const DEFAULT_END: (i32, u32, u32) = (2024, 12, 31);

#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    seed: u64,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, name: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(name.as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    fn bounds(range: DateRange) -> (NaiveDate, NaiveDate) {
        let fallback = |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN);
        (
            range.start.unwrap_or_else(|| fallback(DEFAULT_START)),
            range.end.unwrap_or_else(|| fallback(DEFAULT_END)),
        )
    }
}

/// Standard normal draw (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let Some(mut current) = NaiveDate::from_ymd_opt(start.year(), start.month(), 1) else {
        return out;
    };
    if current < start {
        current = current + chrono::Months::new(1);
    }
    while current <= end {
        out.push(current);
        current = current + chrono::Months::new(1);
    }
    out
}

fn sundays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let offset = (7 - start.weekday().num_days_from_sunday()) % 7;
    let mut current = start + Duration::days(offset as i64);
    let mut out = Vec::new();
    while current <= end {
        out.push(current);
        current += Duration::days(7);
    }
    out
}

fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

fn random_walk(rng: &mut StdRng, n: usize, base: f64, step: f64, clip: Option<(f64, f64)>) -> Vec<f64> {
    let mut cumulative = 0.0;
    (0..n)
        .map(|_| {
            cumulative += standard_normal(rng);
            let v = base + cumulative * step;
            clip.map_or(v, |(lo, hi)| v.clamp(lo, hi))
        })
        .collect()
}

impl IndicatorSource for SyntheticSource {
    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch_indicators(
        &self,
        names: &[String],
        range: DateRange,
    ) -> Result<Vec<IndicatorSeries>, DataError> {
        let (start, end) = Self::bounds(range);
        let months = month_starts(start, end);

        names
            .iter()
            .map(|name| {
                let mut rng = self.rng_for(name);
                let n = months.len();
                let (dates, values) = match name.as_str() {
                    "UNRATE" => (months.clone(), random_walk(&mut rng, n, 5.0, 0.1, Some((3.5, 10.0)))),
                    "CIVPART" => (months.clone(), random_walk(&mut rng, n, 63.0, 0.05, Some((61.0, 67.0)))),
                    "PAYEMS" => (months.clone(), random_walk(&mut rng, n, 150_000.0, 1_000.0, None)),
                    "ICSA" => {
                        let weeks = sundays(start, end);
                        let values = weeks
                            .iter()
                            .map(|_| (250_000.0 + standard_normal(&mut rng) * 20_000.0).clamp(180_000.0, 400_000.0))
                            .collect();
                        (weeks, values)
                    }
                    _ => return Err(DataError::UnknownIndicator { name: name.clone() }),
                };
                if dates.is_empty() {
                    return Err(DataError::Empty { name: name.clone() });
                }
                Ok(IndicatorSeries::from_pairs(name.clone(), dates.into_iter().zip(values))?)
            })
            .collect()
    }
}

impl PriceSource for SyntheticSource {
    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch_prices(
        &self,
        risky: &str,
        defensive: &str,
        range: DateRange,
    ) -> Result<(PriceSeries, PriceSeries), DataError> {
        let (start, end) = Self::bounds(range);
        let days = business_days(start, end);
        if days.is_empty() {
            return Err(DataError::Empty {
                name: risky.to_string(),
            });
        }

        let mut rng = self.rng_for("prices");
        let mut risky_price = 100.0;
        let mut defensive_price = 100.0;
        let mut a = Vec::with_capacity(days.len());
        let mut b = Vec::with_capacity(days.len());
        for date in days {
            let r_risky = 0.0003 + 0.01 * standard_normal(&mut rng);
            let r_defensive = -0.3 * r_risky + 0.0001 + 0.005 * standard_normal(&mut rng);
            risky_price *= 1.0 + r_risky;
            defensive_price *= 1.0 + r_defensive;
            a.push((date, risky_price));
            b.push((date, defensive_price));
        }
        Ok((
            PriceSeries::from_pairs(risky, a)?,
            PriceSeries::from_pairs(defensive, b)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn names() -> Vec<String> {
        DEFAULT_INDICATORS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn indicators_are_deterministic() {
        let range = DateRange::new(Some(d(2015, 1, 1)), Some(d(2019, 12, 31)));
        let a = SyntheticSource::new(7).fetch_indicators(&names(), range).unwrap();
        let b = SyntheticSource::new(7).fetch_indicators(&names(), range).unwrap();
        assert_eq!(a, b);
        let c = SyntheticSource::new(8).fetch_indicators(&names(), range).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn subset_request_matches_full_request() {
        let range = DateRange::new(Some(d(2015, 1, 1)), Some(d(2016, 12, 31)));
        let source = SyntheticSource::new(42);
        let full = source.fetch_indicators(&names(), range).unwrap();
        let only = source.fetch_indicators(&["PAYEMS".to_string()], range).unwrap();
        assert_eq!(full[2], only[0]);
    }

    #[test]
    fn indicator_levels_respect_clips() {
        let range = DateRange::new(Some(d(2000, 1, 1)), Some(d(2020, 12, 31)));
        let series = SyntheticSource::new(1).fetch_indicators(&names(), range).unwrap();
        assert_eq!(series[0].len(), 252);
        assert!(series[0].values().iter().all(|v| (3.5..=10.0).contains(v)));
        assert!(series[1].values().iter().all(|v| (61.0..=67.0).contains(v)));
        assert!(series[3].values().iter().all(|v| (180_000.0..=400_000.0).contains(v)));
        assert!(series[3]
            .observations()
            .iter()
            .all(|o| o.date.weekday() == Weekday::Sun));
    }

    #[test]
    fn unknown_indicator_rejected() {
        let err = SyntheticSource::new(1)
            .fetch_indicators(&["GDP".to_string()], DateRange::default())
            .unwrap_err();
        assert!(matches!(err, DataError::UnknownIndicator { .. }));
    }

    #[test]
    fn prices_skip_weekends_and_stay_positive() {
        let range = DateRange::new(Some(d(2024, 1, 1)), Some(d(2024, 3, 31)));
        let (spy, tlt) = SyntheticSource::new(3).fetch_prices("SPY", "TLT", range).unwrap();
        assert_eq!(spy.len(), tlt.len());
        assert_eq!(spy.len(), 65);
        assert!(spy
            .points()
            .iter()
            .all(|p| !matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }
}
