//! Performance metrics — pure functions over a completed return series.
//!
//! Metrics that need at least two observations, or a non-zero spread, return
//! `None` rather than NaN or a sentinel.

use serde::{Deserialize, Serialize};

/// Spread below which a ratio is treated as undefined.
const MIN_STD: f64 = 1e-15;

/// Aggregate performance of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: Option<f64>,
    pub annualized_volatility: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub calmar: Option<f64>,
    /// Most negative drawdown as a fraction (e.g. -0.15).
    pub max_drawdown: f64,
    /// Share of rebalance-to-rebalance periods with a non-negative return.
    pub win_rate: Option<f64>,
    /// Sum of absolute weight changes over all rebalances.
    pub turnover: f64,
    /// Transaction costs paid, in currency.
    pub total_transaction_cost: f64,
    pub rebalance_count: usize,
    pub trading_days: usize,
}

/// Inputs collected by the engine during a run.
#[derive(Debug, Clone, Copy)]
pub struct MetricInputs<'a> {
    pub returns: &'a [f64],
    pub equity_curve: &'a [f64],
    pub period_returns: &'a [f64],
    pub turnover: f64,
    pub total_transaction_cost: f64,
    pub rebalance_count: usize,
    pub trading_days_per_year: f64,
    pub risk_free_rate: f64,
}

impl PerformanceMetrics {
    pub fn compute(inputs: &MetricInputs<'_>) -> Self {
        let tdy = inputs.trading_days_per_year;
        let rf = inputs.risk_free_rate;
        let cagr = cagr(inputs.equity_curve, inputs.returns.len(), tdy);
        let max_dd = max_drawdown(inputs.equity_curve);
        Self {
            total_return: total_return(inputs.equity_curve),
            cagr,
            annualized_volatility: annualized_volatility(inputs.returns, tdy),
            sharpe: sharpe_ratio(inputs.returns, tdy, rf),
            sortino: sortino_ratio(inputs.returns, tdy, rf),
            calmar: calmar_ratio(cagr, max_dd),
            max_drawdown: max_dd,
            win_rate: win_rate(inputs.period_returns),
            turnover: inputs.turnover,
            total_transaction_cost: inputs.total_transaction_cost,
            rebalance_count: inputs.rebalance_count,
            trading_days: inputs.returns.len(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if initial > 0.0 => (last - initial) / initial,
        _ => 0.0,
    }
}

/// Compound annual growth rate over `periods` returns.
pub fn cagr(equity_curve: &[f64], periods: usize, trading_days_per_year: f64) -> Option<f64> {
    let (&initial, &last) = (equity_curve.first()?, equity_curve.last()?);
    if periods == 0 || initial <= 0.0 || last <= 0.0 || trading_days_per_year <= 0.0 {
        return None;
    }
    let years = periods as f64 / trading_days_per_year;
    Some((last / initial).powf(1.0 / years) - 1.0)
}

/// Sample standard deviation scaled by `sqrt(trading_days_per_year)`.
pub fn annualized_volatility(returns: &[f64], trading_days_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    Some(std_dev(returns) * trading_days_per_year.sqrt())
}

/// Annualized Sharpe ratio of daily returns.
///
/// Sharpe = mean(r - rf_daily) / std(r - rf_daily) * sqrt(T), with
/// `rf_daily = risk_free_rate / T`.
pub fn sharpe_ratio(returns: &[f64], trading_days_per_year: f64, risk_free_rate: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let excess = excess_returns(returns, trading_days_per_year, risk_free_rate);
    let std = std_dev(&excess);
    if std < MIN_STD {
        return None;
    }
    Some(mean_f64(&excess) / std * trading_days_per_year.sqrt())
}

/// Annualized Sortino ratio.
///
/// Downside deviation is the sample standard deviation of the negative excess
/// returns only.
pub fn sortino_ratio(returns: &[f64], trading_days_per_year: f64, risk_free_rate: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let excess = excess_returns(returns, trading_days_per_year, risk_free_rate);
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.len() < 2 {
        return None;
    }
    let downside_std = std_dev(&downside);
    if downside_std < MIN_STD {
        return None;
    }
    Some(mean_f64(&excess) / downside_std * trading_days_per_year.sqrt())
}

/// Calmar ratio: CAGR / |max drawdown|. `None` without a drawdown.
pub fn calmar_ratio(cagr: Option<f64>, max_drawdown: f64) -> Option<f64> {
    if max_drawdown >= 0.0 {
        return None;
    }
    cagr.map(|c| c / max_drawdown.abs())
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    drawdown_series(equity_curve)
        .into_iter()
        .fold(0.0_f64, f64::min)
}

/// Drawdown from the running peak at every point of the curve.
pub fn drawdown_series(equity_curve: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity_curve
        .iter()
        .map(|&eq| {
            peak = peak.max(eq);
            if peak > 0.0 {
                eq / peak - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Fraction of periods with a non-negative compounded return.
pub fn win_rate(period_returns: &[f64]) -> Option<f64> {
    if period_returns.is_empty() {
        return None;
    }
    let wins = period_returns.iter().filter(|r| **r >= 0.0).count();
    Some(wins as f64 / period_returns.len() as f64)
}

/// Trailing annualized Sharpe over `window` returns, aligned with `returns`.
pub fn rolling_sharpe(
    returns: &[f64],
    window: usize,
    trading_days_per_year: f64,
    risk_free_rate: f64,
) -> Vec<Option<f64>> {
    (0..returns.len())
        .map(|i| {
            if window < 2 || i + 1 < window {
                return None;
            }
            sharpe_ratio(&returns[i + 1 - window..=i], trading_days_per_year, risk_free_rate)
        })
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns of an equity curve.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn excess_returns(returns: &[f64], trading_days_per_year: f64, risk_free_rate: f64) -> Vec<f64> {
    let daily_rf = risk_free_rate / trading_days_per_year;
    returns.iter().map(|r| r - daily_rf).collect()
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}
