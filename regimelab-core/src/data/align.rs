//! Two-asset time alignment.
//!
//! The engine trades only on dates where both assets have a price
//! ([`inner_join`]). Price collaborators may instead forward-fill onto the
//! union of dates ([`forward_fill_union`]) before handing series over.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::domain::{PricePoint, PriceSeries};

/// Prices of both assets on their common dates.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedPrices {
    pub dates: Vec<NaiveDate>,
    pub risky: Vec<f64>,
    pub defensive: Vec<f64>,
    /// Dates present in only one of the inputs.
    pub dropped: usize,
}

impl JoinedPrices {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Keep only dates present in both series.
pub fn inner_join(risky: &PriceSeries, defensive: &PriceSeries) -> JoinedPrices {
    let a = risky.points();
    let b = defensive.points();
    let mut joined = JoinedPrices {
        dates: Vec::with_capacity(a.len().min(b.len())),
        risky: Vec::with_capacity(a.len().min(b.len())),
        defensive: Vec::with_capacity(a.len().min(b.len())),
        dropped: 0,
    };

    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].date.cmp(&b[j].date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                joined.dates.push(a[i].date);
                joined.risky.push(a[i].price);
                joined.defensive.push(b[j].price);
                i += 1;
                j += 1;
            }
        }
    }
    joined.dropped = a.len() + b.len() - 2 * joined.len();
    joined
}

/// Forward-fill both series onto the union of their dates.
///
/// Leading dates before either series has a first price are dropped; no
/// backward fill.
pub fn forward_fill_union(risky: &PriceSeries, defensive: &PriceSeries) -> (PriceSeries, PriceSeries) {
    let dates: BTreeSet<NaiveDate> = risky
        .points()
        .iter()
        .chain(defensive.points())
        .map(|p| p.date)
        .collect();

    let fill = |series: &PriceSeries| -> Vec<Option<f64>> {
        let points = series.points();
        let mut idx = 0;
        let mut last = None;
        dates
            .iter()
            .map(|date| {
                while idx < points.len() && points[idx].date <= *date {
                    last = Some(points[idx].price);
                    idx += 1;
                }
                last
            })
            .collect()
    };
    let filled_a = fill(risky);
    let filled_b = fill(defensive);

    let mut out_a = Vec::new();
    let mut out_b = Vec::new();
    for ((date, pa), pb) in dates.iter().zip(filled_a).zip(filled_b) {
        if let (Some(pa), Some(pb)) = (pa, pb) {
            out_a.push(PricePoint { date: *date, price: pa });
            out_b.push(PricePoint { date: *date, price: pb });
        }
    }
    (
        PriceSeries::from_validated(risky.symbol.clone(), out_a),
        PriceSeries::from_validated(defensive.symbol.clone(), out_b),
    )
}
