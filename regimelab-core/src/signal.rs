//! Composite index, smoothing and regime classification.
//!
//! Per-indicator surprises are inner-joined on date, combined with fixed
//! weights, smoothed by a configured [`Smoother`], and mapped to a regime by
//! a step function of the smoothed value. Allocation weights come from the
//! regime alone.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Diagnostic, Regime, SignalStrength, SurpriseSeries, TargetWeight, WEIGHT_SUM_TOLERANCE,
};
use crate::smoothing::Smoother;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalError {
    #[error("invalid indicator weights: {0}")]
    InvalidWeights(String),
    #[error("regime thresholds must satisfy upper > lower and be finite (upper {upper}, lower {lower})")]
    InvalidThresholds { upper: f64, lower: f64 },
    #[error("no date is defined in all {series} surprise series")]
    MisalignedSeries { series: usize },
}

// ─── Thresholds ──────────────────────────────────────────────────────

/// Regime boundaries on the smoothed composite. Comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub upper: f64,
    pub lower: f64,
}

impl RegimeThresholds {
    /// `+theta` / `-theta`; theta must be positive.
    pub fn symmetric(theta: f64) -> Result<Self, SignalError> {
        if !(theta.is_finite() && theta > 0.0) {
            return Err(SignalError::InvalidThresholds {
                upper: theta,
                lower: -theta,
            });
        }
        Ok(Self {
            upper: theta,
            lower: -theta,
        })
    }

    pub fn new(upper: f64, lower: f64) -> Result<Self, SignalError> {
        if !(upper.is_finite() && lower.is_finite() && upper > lower) {
            return Err(SignalError::InvalidThresholds { upper, lower });
        }
        Ok(Self { upper, lower })
    }

    pub fn classify(&self, smoothed: f64) -> Regime {
        if smoothed > self.upper {
            Regime::RiskOn
        } else if smoothed < self.lower {
            Regime::RiskOff
        } else {
            Regime::Neutral
        }
    }

    /// Magnitude under which a signal is labelled weak.
    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            upper: 0.5,
            lower: -0.5,
        }
    }
}

// ─── Composite signal ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositePoint {
    pub date: NaiveDate,
    pub raw: f64,
    /// `None` while the smoother is warming up.
    pub smoothed: Option<f64>,
    pub regime: Option<Regime>,
    pub strength: Option<SignalStrength>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSignal {
    pub points: Vec<CompositePoint>,
    pub smoother: String,
    pub thresholds: RegimeThresholds,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompositeSignal {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Dated allocation decisions for every classified point.
    pub fn target_weights(&self) -> Vec<TargetWeight> {
        self.points
            .iter()
            .filter_map(|p| p.regime.map(|r| TargetWeight::from_regime(p.date, r)))
            .collect()
    }

    pub fn regime_summary(&self) -> RegimeSummary {
        RegimeSummary::from_regimes(self.points.iter().filter_map(|p| p.regime))
    }
}

/// Distribution of classified months across regimes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeSummary {
    pub total: usize,
    pub risk_on: usize,
    pub neutral: usize,
    pub risk_off: usize,
}

impl RegimeSummary {
    pub fn from_regimes(regimes: impl IntoIterator<Item = Regime>) -> Self {
        let mut summary = Self::default();
        for regime in regimes {
            summary.total += 1;
            match regime {
                Regime::RiskOn => summary.risk_on += 1,
                Regime::Neutral => summary.neutral += 1,
                Regime::RiskOff => summary.risk_off += 1,
            }
        }
        summary
    }

    pub fn count(&self, regime: Regime) -> usize {
        match regime {
            Regime::RiskOn => self.risk_on,
            Regime::Neutral => self.neutral,
            Regime::RiskOff => self.risk_off,
        }
    }

    /// Share of classified months in `regime`, in percent. `None` when empty.
    pub fn percentage(&self, regime: Regime) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.count(regime) as f64 / self.total as f64 * 100.0)
    }
}

// ─── Generator ───────────────────────────────────────────────────────

pub struct SignalGenerator {
    weights: BTreeMap<String, f64>,
    smoother: Box<dyn Smoother>,
    thresholds: RegimeThresholds,
}

impl std::fmt::Debug for SignalGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalGenerator")
            .field("weights", &self.weights)
            .field("smoother", &self.smoother.name())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

/// Weights must be finite and sum to one.
pub fn validate_weights(weights: &BTreeMap<String, f64>) -> Result<(), SignalError> {
    if weights.is_empty() {
        return Err(SignalError::InvalidWeights("no indicators weighted".into()));
    }
    if let Some((name, w)) = weights.iter().find(|(_, w)| !w.is_finite()) {
        return Err(SignalError::InvalidWeights(format!("{name} has weight {w}")));
    }
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(SignalError::InvalidWeights(format!("weights sum to {sum}, expected 1.0")));
    }
    Ok(())
}

impl SignalGenerator {
    pub fn new(
        weights: BTreeMap<String, f64>,
        smoother: Box<dyn Smoother>,
        thresholds: RegimeThresholds,
    ) -> Result<Self, SignalError> {
        validate_weights(&weights)?;
        Ok(Self {
            weights,
            smoother,
            thresholds,
        })
    }

    pub fn thresholds(&self) -> RegimeThresholds {
        self.thresholds
    }

    /// Build the composite signal from one surprise series per weighted
    /// indicator.
    pub fn generate(&self, surprises: &[SurpriseSeries]) -> Result<CompositeSignal, SignalError> {
        let by_name = self.match_series(surprises)?;

        // Inner join on dates defined in every series.
        let mut all_dates = BTreeSet::new();
        for series in by_name.values() {
            all_dates.extend(series.defined().map(|(date, _)| date));
        }
        let mut dates = Vec::new();
        let mut raw = Vec::new();
        for &date in &all_dates {
            let mut value = 0.0;
            let mut complete = true;
            for (name, weight) in &self.weights {
                match by_name.get(name.as_str()).and_then(|s| s.at(date)) {
                    Some(z) => value += weight * z,
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                dates.push(date);
                raw.push(value);
            }
        }
        if dates.is_empty() {
            return Err(SignalError::MisalignedSeries {
                series: by_name.len(),
            });
        }

        let mut diagnostics = Vec::new();
        let dropped = all_dates.len() - dates.len();
        if dropped > 0 {
            diagnostics.push(Diagnostic::MisalignedSeries {
                context: "composite".into(),
                dropped,
            });
        }

        let smoothed = self.smoother.smooth(&raw);
        let weak = self.thresholds.half_width();
        let points: Vec<CompositePoint> = dates
            .into_iter()
            .zip(raw)
            .zip(smoothed)
            .map(|((date, raw), smoothed)| CompositePoint {
                date,
                raw,
                smoothed,
                regime: smoothed.map(|s| self.thresholds.classify(s)),
                strength: smoothed.map(|s| SignalStrength::classify(s, weak)),
            })
            .collect();

        let signal = CompositeSignal {
            points,
            smoother: self.smoother.name().to_string(),
            thresholds: self.thresholds,
            diagnostics,
        };
        let summary = signal.regime_summary();
        tracing::info!(
            points = signal.len(),
            classified = summary.total,
            risk_on = summary.risk_on,
            neutral = summary.neutral,
            risk_off = summary.risk_off,
            smoother = %signal.smoother,
            "generated composite signal"
        );
        Ok(signal)
    }

    fn match_series<'a>(
        &self,
        surprises: &'a [SurpriseSeries],
    ) -> Result<BTreeMap<&'a str, &'a SurpriseSeries>, SignalError> {
        let mut by_name = BTreeMap::new();
        for series in surprises {
            if by_name.insert(series.name.as_str(), series).is_some() {
                return Err(SignalError::InvalidWeights(format!(
                    "duplicate surprise series {}",
                    series.name
                )));
            }
        }
        if let Some(missing) = self.weights.keys().find(|k| !by_name.contains_key(k.as_str())) {
            return Err(SignalError::InvalidWeights(format!(
                "{missing} is weighted but has no surprise series"
            )));
        }
        if let Some(extra) = by_name.keys().find(|k| !self.weights.contains_key(**k)) {
            return Err(SignalError::InvalidWeights(format!("{extra} has no weight")));
        }
        Ok(by_name)
    }
}
