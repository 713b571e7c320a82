//! Calendar resampling of higher-frequency indicators.

use chrono::{Datelike, NaiveDate};

use crate::domain::{IndicatorSeries, Observation};

/// Mean of each calendar month, dated on the first of the month.
///
/// The stamp is a label, not a publication date: the value averages every
/// observation in the month, including those after the 1st. A signal built
/// on it and traded the next trading day therefore sees data from later in
/// the same month. Monthly releases stamped on the 1st carry the same
/// convention, which keeps the two on one date grid for the composite join.
///
/// Non-finite observations are ignored; a month without any finite value is
/// omitted.
pub fn resample_monthly_mean(series: &IndicatorSeries) -> IndicatorSeries {
    let mut out: Vec<Observation> = Vec::new();
    let mut current: Option<(NaiveDate, f64, usize)> = None;

    for obs in series.observations() {
        let Some(month) = NaiveDate::from_ymd_opt(obs.date.year(), obs.date.month(), 1) else {
            continue;
        };
        match current {
            Some((m, _, _)) if m != month => {
                push_mean(&mut out, current.take());
                current = Some((month, 0.0, 0));
            }
            None => current = Some((month, 0.0, 0)),
            _ => {}
        }
        if obs.value.is_finite() {
            if let Some((_, sum, count)) = current.as_mut() {
                *sum += obs.value;
                *count += 1;
            }
        }
    }
    push_mean(&mut out, current);

    IndicatorSeries::from_ordered(series.name.clone(), out)
}

fn push_mean(out: &mut Vec<Observation>, bucket: Option<(NaiveDate, f64, usize)>) {
    if let Some((date, sum, count)) = bucket {
        if count > 0 {
            out.push(Observation {
                date,
                value: sum / count as f64,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn weekly_to_monthly_mean() {
        let weekly = IndicatorSeries::from_pairs(
            "ICSA",
            [
                (d(1, 7), 200.0),
                (d(1, 14), 220.0),
                (d(1, 21), 240.0),
                (d(2, 4), 300.0),
                (d(2, 11), f64::NAN),
                (d(4, 7), 100.0),
            ],
        )
        .unwrap();
        let monthly = resample_monthly_mean(&weekly);
        let obs = monthly.observations();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].date, d(1, 1));
        assert!((obs[0].value - 220.0).abs() < 1e-12);
        assert_eq!(obs[1].date, d(2, 1));
        assert_eq!(obs[1].value, 300.0);
        assert_eq!(obs[2].date, d(4, 1));
    }

    #[test]
    fn month_stamp_averages_observations_after_the_first() {
        let weekly = IndicatorSeries::from_pairs(
            "ICSA",
            [(d(5, 3), 210.0), (d(5, 31), 250.0)],
        )
        .unwrap();
        let monthly = resample_monthly_mean(&weekly);
        assert_eq!(monthly.observations()[0].date, d(5, 1));
        assert_eq!(monthly.value_at(d(5, 1)), Some(230.0));
    }

    #[test]
    fn empty_series_stays_empty() {
        let empty = IndicatorSeries::from_pairs("ICSA", []).unwrap();
        assert!(resample_monthly_mean(&empty).is_empty());
    }
}
