//! Inferential statistics over completed return series.
//!
//! Implements from first principles:
//! - Lanczos approximation for ln(Gamma)
//! - Regularized incomplete beta function
//! - Student's t-distribution CDF and two-sided p-values
//! - Welch's unequal-variance t-test
//! - Newey-West (Bartlett kernel) t-test on mean excess return
//!
//! Tests that cannot be computed on the given input return
//! [`TestOutcome::NotApplicable`] with a reason instead of an error, so one
//! failed test never hides the others.

use serde::{Deserialize, Serialize};

use regimelab_core::metrics::{mean_f64, sample_variance};

/// Variance below which a test statistic is treated as undefined.
const MIN_VARIANCE: f64 = 1e-24;

// ─── Outcome wrapper ─────────────────────────────────────────────────

/// Result of one statistical test, or why it was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome<T> {
    Computed(T),
    NotApplicable { reason: String },
}

impl<T> TestOutcome<T> {
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        TestOutcome::NotApplicable {
            reason: reason.into(),
        }
    }

    pub fn computed(&self) -> Option<&T> {
        match self {
            TestOutcome::Computed(value) => Some(value),
            TestOutcome::NotApplicable { .. } => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, TestOutcome::Computed(_))
    }
}

// ─── Math primitives ─────────────────────────────────────────────────

/// Lanczos approximation for ln(Gamma(x)), g=7, n=9.
fn ln_gamma(x: f64) -> f64 {
    #[allow(clippy::excessive_precision)]
    const COEFFICIENTS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    const G: f64 = 7.0;

    if x < 0.5 {
        // Reflection: Gamma(x) * Gamma(1-x) = pi / sin(pi*x)
        let sin_val = (std::f64::consts::PI * x).sin();
        if sin_val.abs() < 1e-300 {
            return f64::INFINITY;
        }
        return std::f64::consts::PI.ln() - sin_val.abs().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }

    let t = x + G + 0.5;
    let log_sqrt_2pi = (2.0 * std::f64::consts::PI).sqrt().ln();

    log_sqrt_2pi + (t.ln() * (x + 0.5)) - t + sum.ln()
}

/// Regularized incomplete beta function I_x(a, b), modified Lentz
/// continued fraction.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) {
        return f64::NAN;
    }
    if x == 0.0 {
        return 0.0;
    }
    if x == 1.0 {
        return 1.0;
    }

    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(b, a, 1.0 - x);
    }

    // x^a * (1-x)^b / (a * B(a,b))
    let ln_prefix =
        a * x.ln() + b * (1.0 - x).ln() - ln_gamma(a) - ln_gamma(b) + ln_gamma(a + b) - a.ln();
    let prefix = ln_prefix.exp();

    const MAX_ITER: usize = 200;
    const EPSILON: f64 = 1e-14;
    const TINY: f64 = 1e-30;

    let clamp_tiny = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0_f64;
    let mut d = 1.0 / clamp_tiny(1.0 - (a + b) * x / (a + 1.0));
    let mut f = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;

        let even = m * (b - m) * x / ((a + 2.0 * m - 1.0) * (a + 2.0 * m));
        d = 1.0 / clamp_tiny(1.0 + even * d);
        c = clamp_tiny(1.0 + even / c);
        f *= c * d;

        let odd = -((a + m) * (a + b + m) * x) / ((a + 2.0 * m) * (a + 2.0 * m + 1.0));
        d = 1.0 / clamp_tiny(1.0 + odd * d);
        c = clamp_tiny(1.0 + odd / c);
        let delta = c * d;
        f *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    prefix * f
}

/// Student's t-distribution CDF: P(T <= t) for `df` degrees of freedom.
pub fn t_cdf(t: f64, df: f64) -> f64 {
    if df <= 0.0 || t.is_nan() {
        return f64::NAN;
    }
    if t == 0.0 {
        return 0.5;
    }

    let tail = 0.5 * two_sided_p_value(t, df);
    if t > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// P(|T| >= |t|) under Student's t with `df` degrees of freedom.
///
/// Evaluated as I_x(df/2, 1/2) with x = df / (df + t²), which keeps full
/// precision in the far tail.
pub fn two_sided_p_value(t: f64, df: f64) -> f64 {
    if df <= 0.0 || t.is_nan() {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

// ─── Welch t-test ────────────────────────────────────────────────────

/// Welch's unequal-variance comparison of two sample means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelchTest {
    pub mean_a: f64,
    pub mean_b: f64,
    pub n_a: usize,
    pub n_b: usize,
    /// (mean_a - mean_b) / standard error.
    pub t_statistic: f64,
    /// Welch-Satterthwaite degrees of freedom.
    pub df: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

/// Two-sided Welch t-test of H0: mean(a) = mean(b).
///
/// Needs at least two observations per group and a non-zero combined
/// variance.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> TestOutcome<WelchTest> {
    if a.len() < 2 || b.len() < 2 {
        return TestOutcome::not_applicable(format!(
            "need at least 2 observations per group, got {} and {}",
            a.len(),
            b.len()
        ));
    }

    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let se_a = sample_variance(a) / n_a;
    let se_b = sample_variance(b) / n_b;
    let se_sq = se_a + se_b;
    if se_sq < MIN_VARIANCE {
        return TestOutcome::not_applicable("both groups have zero variance");
    }

    let mean_a = mean_f64(a);
    let mean_b = mean_f64(b);
    let t_statistic = (mean_a - mean_b) / se_sq.sqrt();
    let df = se_sq * se_sq / (se_a * se_a / (n_a - 1.0) + se_b * se_b / (n_b - 1.0));

    TestOutcome::Computed(WelchTest {
        mean_a,
        mean_b,
        n_a: a.len(),
        n_b: b.len(),
        t_statistic,
        df,
        p_value: two_sided_p_value(t_statistic, df),
    })
}

// ─── Newey-West ──────────────────────────────────────────────────────

/// Autocorrelation-robust test of a non-zero mean excess return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeweyWestTest {
    pub observations: usize,
    pub lags: usize,
    pub mean_excess_return: f64,
    /// sqrt(long-run variance / n).
    pub standard_error: f64,
    pub t_statistic: f64,
    /// Two-sided, Student's t with n - 1 degrees of freedom.
    pub p_value: f64,
}

/// Rule-of-thumb lag count floor(4 * (n/100)^(2/9)).
pub fn default_lags(n: usize) -> usize {
    (4.0 * (n as f64 / 100.0).powf(2.0 / 9.0)).floor() as usize
}

/// Bartlett-weighted long-run variance of a series around its mean.
pub fn long_run_variance(values: &[f64], lags: usize) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let demeaned: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let autocovariance = |lag: usize| -> f64 {
        demeaned[lag..]
            .iter()
            .zip(&demeaned[..n - lag])
            .map(|(x, y)| x * y)
            .sum::<f64>()
            / n as f64
    };

    let lags = lags.min(n - 1);
    let mut lrv = autocovariance(0);
    for lag in 1..=lags {
        let weight = 1.0 - lag as f64 / (lags + 1) as f64;
        lrv += 2.0 * weight * autocovariance(lag);
    }
    lrv
}

/// Newey-West t-test of H0: mean(returns - daily_risk_free) = 0.
///
/// `lags` of `None` uses [`default_lags`]. Needs at least three returns and
/// a positive long-run variance.
pub fn newey_west_test(
    returns: &[f64],
    daily_risk_free: f64,
    lags: Option<usize>,
) -> TestOutcome<NeweyWestTest> {
    let n = returns.len();
    if n < 3 {
        return TestOutcome::not_applicable(format!("need at least 3 returns, got {n}"));
    }

    let excess: Vec<f64> = returns.iter().map(|r| r - daily_risk_free).collect();
    let lags = lags.unwrap_or_else(|| default_lags(n)).min(n - 1);
    let lrv = long_run_variance(&excess, lags);
    if lrv.is_nan() || lrv <= MIN_VARIANCE {
        return TestOutcome::not_applicable("long-run variance is not positive");
    }

    let mean_excess_return = mean_f64(&excess);
    let standard_error = (lrv / n as f64).sqrt();
    let t_statistic = mean_excess_return / standard_error;

    TestOutcome::Computed(NeweyWestTest {
        observations: n,
        lags,
        mean_excess_return,
        standard_error,
        t_statistic,
        p_value: two_sided_p_value(t_statistic, (n - 1) as f64),
    })
}
