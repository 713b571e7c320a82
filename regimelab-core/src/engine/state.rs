//! Portfolio state carried through the daily scan.
//!
//! Created at inception, mutated once per trading day, dropped when the run
//! ends. Nothing outside the engine sees it.

use crate::domain::AllocationWeights;

#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub value: f64,
    pub peak: f64,
    /// Weights at the start of the next day, after drift.
    pub weights: AllocationWeights,
    pub total_turnover: f64,
    pub total_cost: f64,
    pub rebalance_count: usize,
    /// Growth factor of the current rebalance-to-rebalance period.
    period_growth: f64,
    period_days: usize,
    period_returns: Vec<f64>,
}

/// What happened on one simulated day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayOutcome {
    pub daily_return: f64,
    /// Weights held during the day (after any rebalance, before drift).
    pub weights: AllocationWeights,
    pub turnover: f64,
    pub cost: f64,
}

impl PortfolioState {
    /// Inception: the first allocation is free.
    pub fn new(initial_capital: f64, weights: AllocationWeights) -> Self {
        Self {
            value: initial_capital,
            peak: initial_capital,
            weights,
            total_turnover: 0.0,
            total_cost: 0.0,
            rebalance_count: 0,
            period_growth: 1.0,
            period_days: 0,
            period_returns: Vec::new(),
        }
    }

    /// Simulate one trading day.
    ///
    /// On a rebalance day the cost `turnover * bps / 1e4` is charged on the
    /// prior close and the target is set before the day's returns accrue.
    pub fn step(
        &mut self,
        risky_return: f64,
        defensive_return: f64,
        rebalance_to: Option<AllocationWeights>,
        cost_bps: f64,
    ) -> DayOutcome {
        let mut turnover = 0.0;
        let mut cost_fraction = 0.0;
        if let Some(target) = rebalance_to {
            self.close_period();
            turnover = self.weights.turnover_to(&target);
            cost_fraction = turnover * cost_bps / 10_000.0;
            self.weights = target;
            self.rebalance_count += 1;
            self.total_turnover += turnover;
        }
        let held = self.weights;
        let cost = self.value * cost_fraction;

        let gross = held.risky * risky_return + held.defensive * defensive_return;
        let daily_return = (1.0 - cost_fraction) * (1.0 + gross) - 1.0;

        self.value *= 1.0 + daily_return;
        self.peak = self.peak.max(self.value);
        self.total_cost += cost;
        self.weights = AllocationWeights {
            risky: held.risky * (1.0 + risky_return) / (1.0 + gross),
            defensive: held.defensive * (1.0 + defensive_return) / (1.0 + gross),
        };
        self.period_growth *= 1.0 + daily_return;
        self.period_days += 1;

        DayOutcome {
            daily_return,
            weights: held,
            turnover,
            cost,
        }
    }

    pub fn drawdown(&self) -> f64 {
        if self.peak > 0.0 {
            self.value / self.peak - 1.0
        } else {
            0.0
        }
    }

    fn close_period(&mut self) {
        if self.period_days > 0 {
            self.period_returns.push(self.period_growth - 1.0);
        }
        self.period_growth = 1.0;
        self.period_days = 0;
    }

    /// Compounded return of every rebalance-to-rebalance period.
    pub fn finish(mut self) -> Vec<f64> {
        self.close_period();
        self.period_returns
    }
}
