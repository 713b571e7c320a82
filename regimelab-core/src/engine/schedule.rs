//! Rebalance calendar rules.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceRule {
    /// First trading day of each calendar month, plus the first day a new
    /// signal is in force.
    #[default]
    Monthly,
    /// First trading day of each ISO week, plus the first day a new signal
    /// is in force.
    Weekly,
    Daily,
    /// Only when a new signal comes into force.
    OnSignal,
    /// Buy and hold the initial allocation.
    Never,
}

impl RebalanceRule {
    /// Whether `current` is a rebalance day given the previous trading day.
    ///
    /// `pending_signal` is true when the target in force is newer than the
    /// last one traded. Every rule except `Never` trades it immediately.
    pub fn is_due(self, previous: NaiveDate, current: NaiveDate, pending_signal: bool) -> bool {
        match self {
            RebalanceRule::Monthly => {
                pending_signal
                    || (current.year(), current.month()) != (previous.year(), previous.month())
            }
            RebalanceRule::Weekly => pending_signal || current.iso_week() != previous.iso_week(),
            RebalanceRule::Daily => true,
            RebalanceRule::OnSignal => pending_signal,
            RebalanceRule::Never => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RebalanceRule::Monthly => "monthly",
            RebalanceRule::Weekly => "weekly",
            RebalanceRule::Daily => "daily",
            RebalanceRule::OnSignal => "on_signal",
            RebalanceRule::Never => "never",
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
    fn monthly_fires_on_month_change_only() {
        let rule = RebalanceRule::Monthly;
        assert!(rule.is_due(d(2024, 1, 31), d(2024, 2, 1), false));
        assert!(!rule.is_due(d(2024, 2, 1), d(2024, 2, 2), true));
        // Same month number, different year.
        assert!(rule.is_due(d(2023, 1, 31), d(2024, 1, 2), false));
    }

    #[test]
    fn calendar_rules_trade_a_pending_signal_mid_period() {
        // Mon 2024-04-01 -> Tue 2024-04-02: no period boundary.
        let (a, b) = (d(2024, 4, 1), d(2024, 4, 2));
        assert!(!RebalanceRule::Monthly.is_due(a, b, false));
        assert!(RebalanceRule::Monthly.is_due(a, b, true));
        assert!(!RebalanceRule::Weekly.is_due(a, b, false));
        assert!(RebalanceRule::Weekly.is_due(a, b, true));
    }

    #[test]
    fn weekly_uses_iso_weeks() {
        let rule = RebalanceRule::Weekly;
        // Fri 2024-01-05 -> Mon 2024-01-08
        assert!(rule.is_due(d(2024, 1, 5), d(2024, 1, 8), false));
        assert!(!rule.is_due(d(2024, 1, 8), d(2024, 1, 9), false));
        // ISO week 1 of 2025 starts on Mon 2024-12-30.
        assert!(!rule.is_due(d(2024, 12, 30), d(2025, 1, 2), false));
    }

    #[test]
    fn signal_and_never_rules() {
        let (a, b) = (d(2024, 3, 4), d(2024, 3, 5));
        assert!(RebalanceRule::OnSignal.is_due(a, b, true));
        assert!(!RebalanceRule::OnSignal.is_due(a, b, false));
        assert!(!RebalanceRule::Never.is_due(d(2024, 1, 31), d(2024, 2, 1), true));
        assert!(RebalanceRule::Daily.is_due(a, b, false));
    }
}
