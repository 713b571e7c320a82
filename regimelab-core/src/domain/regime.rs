//! Regime labels and the allocation table derived from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance for checking that a weight pair sums to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Discrete macro regime of the smoothed composite index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    RiskOn,
    Neutral,
    RiskOff,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::RiskOn, Regime::Neutral, Regime::RiskOff];

    pub fn label(self) -> &'static str {
        match self {
            Regime::RiskOn => "RISK_ON",
            Regime::Neutral => "NEUTRAL",
            Regime::RiskOff => "RISK_OFF",
        }
    }

    /// Fixed allocation table. Depends on the regime only.
    pub fn allocation(self) -> AllocationWeights {
        match self {
            Regime::RiskOn => AllocationWeights {
                risky: 0.8,
                defensive: 0.2,
            },
            Regime::Neutral => AllocationWeights {
                risky: 0.5,
                defensive: 0.5,
            },
            Regime::RiskOff => AllocationWeights {
                risky: 0.2,
                defensive: 0.8,
            },
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Portfolio split between the risky and the defensive asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationWeights {
    pub risky: f64,
    pub defensive: f64,
}

impl AllocationWeights {
    pub fn new(risky: f64, defensive: f64) -> Self {
        Self { risky, defensive }
    }

    /// Finite, non-negative and summing to one within tolerance.
    pub fn is_valid(&self) -> bool {
        self.risky.is_finite()
            && self.defensive.is_finite()
            && self.risky >= 0.0
            && self.defensive >= 0.0
            && (self.risky + self.defensive - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Sum of absolute weight changes needed to move from `self` to `target`.
    pub fn turnover_to(&self, target: &AllocationWeights) -> f64 {
        (target.risky - self.risky).abs() + (target.defensive - self.defensive).abs()
    }
}

/// A dated allocation decision fed to the backtest engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetWeight {
    /// Signal timestamp. The weights take effect on the next trading day.
    pub date: NaiveDate,
    pub weights: AllocationWeights,
    /// Regime behind the decision, when it came from the signal generator.
    pub regime: Option<Regime>,
}

impl TargetWeight {
    pub fn from_regime(date: NaiveDate, regime: Regime) -> Self {
        Self {
            date,
            weights: regime.allocation(),
            regime: Some(regime),
        }
    }

    pub fn constant(date: NaiveDate, risky: f64) -> Self {
        Self {
            date,
            weights: AllocationWeights::new(risky, 1.0 - risky),
            regime: None,
        }
    }
}

/// Magnitude label for a smoothed composite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

impl SignalStrength {
    pub const STRONG_THRESHOLD: f64 = 1.5;

    pub fn classify(value: f64, weak_threshold: f64) -> Self {
        let magnitude = value.abs();
        if magnitude < weak_threshold {
            SignalStrength::Weak
        } else if magnitude < Self::STRONG_THRESHOLD {
            SignalStrength::Moderate
        } else {
            SignalStrength::Strong
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SignalStrength::Weak => "WEAK",
            SignalStrength::Moderate => "MODERATE",
            SignalStrength::Strong => "STRONG",
        }
    }
}
