//! Paired bootstrap test of the max-drawdown difference between a strategy
//! and its benchmark.
//!
//! Both return series are resampled with the same indices so their
//! day-by-day dependence survives. Three schemes are available: i.i.d. days,
//! fixed-length circular blocks, and stationary blocks with geometric
//! lengths (Politis & Romano, 1994).
//!
//! Every resample draws from its own `StdRng` seeded by a BLAKE3 sub-seed of
//! `(seed, iteration)`, so sequential and parallel runs are bit-identical.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Configuration ───────────────────────────────────────────────────

/// How resampled index paths are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResampleScheme {
    /// Independent draws with replacement.
    Iid,
    /// Fixed-length blocks starting at random positions, wrapping around.
    Block { block_length: usize },
    /// Geometric block lengths with the given mean.
    Stationary { mean_block_length: usize },
}

impl Default for ResampleScheme {
    fn default() -> Self {
        ResampleScheme::Stationary {
            mean_block_length: 20,
        }
    }
}

impl ResampleScheme {
    pub fn label(&self) -> String {
        match self {
            ResampleScheme::Iid => "iid".into(),
            ResampleScheme::Block { block_length } => format!("block({block_length})"),
            ResampleScheme::Stationary { mean_block_length } => {
                format!("stationary({mean_block_length})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub n_resamples: usize,
    pub scheme: ResampleScheme,
    pub seed: u64,
    /// Spread resamples across the rayon pool.
    pub parallel: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_resamples: 1000,
            scheme: ResampleScheme::default(),
            seed: 42,
            parallel: true,
        }
    }
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.n_resamples == 0 {
            return Err(BootstrapError::InvalidConfig(
                "n_resamples must be > 0".into(),
            ));
        }
        match self.scheme {
            ResampleScheme::Block { block_length: 0 } => Err(BootstrapError::InvalidConfig(
                "block_length must be > 0".into(),
            )),
            ResampleScheme::Stationary {
                mean_block_length: 0,
            } => Err(BootstrapError::InvalidConfig(
                "mean_block_length must be > 0".into(),
            )),
            _ => Ok(()),
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownBootstrap {
    pub strategy_max_drawdown: f64,
    pub benchmark_max_drawdown: f64,
    /// strategy - benchmark; positive means the strategy drew down less.
    pub observed_difference: f64,
    /// Two-sided p-value of a zero difference.
    pub p_value: f64,
    /// 5th percentile of the resampled differences.
    pub ci_lower: f64,
    /// 95th percentile of the resampled differences.
    pub ci_upper: f64,
    pub n_resamples: usize,
    pub sample_size: usize,
    pub scheme: ResampleScheme,
}

#[derive(Debug, Error, PartialEq)]
pub enum BootstrapError {
    #[error("invalid bootstrap configuration: {0}")]
    InvalidConfig(String),
    #[error("strategy has {strategy} returns but benchmark has {benchmark}")]
    LengthMismatch { strategy: usize, benchmark: usize },
    #[error("insufficient data: {sample_size} returns, need at least 2")]
    InsufficientData { sample_size: usize },
}

// ─── Test ────────────────────────────────────────────────────────────

/// Bootstrap the max-drawdown difference of two aligned daily return series.
///
/// The p-value counts resampled differences at least `|observed|` away from
/// the observed difference, which re-centres the resampling distribution on
/// the null of no difference, with the usual +1 correction.
pub fn drawdown_difference_test(
    strategy: &[f64],
    benchmark: &[f64],
    config: &BootstrapConfig,
) -> Result<DrawdownBootstrap, BootstrapError> {
    config.validate()?;
    if strategy.len() != benchmark.len() {
        return Err(BootstrapError::LengthMismatch {
            strategy: strategy.len(),
            benchmark: benchmark.len(),
        });
    }
    let n = strategy.len();
    if n < 2 {
        return Err(BootstrapError::InsufficientData { sample_size: n });
    }

    let strategy_mdd = max_drawdown_of_returns(strategy.iter().copied());
    let benchmark_mdd = max_drawdown_of_returns(benchmark.iter().copied());
    let observed = strategy_mdd - benchmark_mdd;

    let one = |iteration: usize| -> f64 {
        let mut rng = rng_for(config.seed, iteration as u64);
        let indices = resample_indices(n, config.scheme, &mut rng);
        max_drawdown_of_returns(indices.iter().map(|&i| strategy[i]))
            - max_drawdown_of_returns(indices.iter().map(|&i| benchmark[i]))
    };

    let mut diffs: Vec<f64> = if config.parallel {
        (0..config.n_resamples).into_par_iter().map(one).collect()
    } else {
        (0..config.n_resamples).map(one).collect()
    };

    let extreme = diffs
        .iter()
        .filter(|d| (*d - observed).abs() >= observed.abs())
        .count();
    let p_value = (1 + extreme) as f64 / (config.n_resamples + 1) as f64;

    diffs.sort_by(|a, b| a.total_cmp(b));

    tracing::debug!(
        observed,
        p_value,
        resamples = config.n_resamples,
        scheme = %config.scheme.label(),
        "drawdown bootstrap complete"
    );

    Ok(DrawdownBootstrap {
        strategy_max_drawdown: strategy_mdd,
        benchmark_max_drawdown: benchmark_mdd,
        observed_difference: observed,
        p_value,
        ci_lower: percentile_sorted(&diffs, 5.0),
        ci_upper: percentile_sorted(&diffs, 95.0),
        n_resamples: config.n_resamples,
        sample_size: n,
        scheme: config.scheme,
    })
}

/// Most negative drawdown of the equity path implied by `returns`,
/// starting from 1.0.
pub fn max_drawdown_of_returns(returns: impl IntoIterator<Item = f64>) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = worst.min(equity / peak - 1.0);
        }
    }
    worst
}

// ─── Resampling ──────────────────────────────────────────────────────

fn sub_seed(seed: u64, iteration: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(b"drawdown-bootstrap");
    hasher.update(&iteration.to_le_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn rng_for(seed: u64, iteration: u64) -> StdRng {
    StdRng::seed_from_u64(sub_seed(seed, iteration))
}

/// One resampled index path of length `n`.
fn resample_indices(n: usize, scheme: ResampleScheme, rng: &mut StdRng) -> Vec<usize> {
    let mut indices = Vec::with_capacity(n);
    match scheme {
        ResampleScheme::Iid => {
            indices.extend((0..n).map(|_| rng.gen_range(0..n)));
        }
        ResampleScheme::Block { block_length } => {
            while indices.len() < n {
                let start = rng.gen_range(0..n);
                let take = block_length.min(n - indices.len());
                indices.extend((0..take).map(|k| (start + k) % n));
            }
        }
        ResampleScheme::Stationary { mean_block_length } => {
            let p = 1.0 / mean_block_length.max(1) as f64;
            let mut pos = rng.gen_range(0..n);
            for _ in 0..n {
                indices.push(pos);
                pos = if rng.gen::<f64>() < p {
                    rng.gen_range(0..n)
                } else {
                    (pos + 1) % n
                };
            }
        }
    }
    indices
}

/// Linear-interpolated percentile of a sorted slice.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-returns (LCG), no RNG crate involved.
    fn lcg_returns(n: usize, seed: u64, scale: f64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let u = (state >> 11) as f64 / (1u64 << 53) as f64;
                (u - 0.5) * scale
            })
            .collect()
    }

    fn config(scheme: ResampleScheme, parallel: bool) -> BootstrapConfig {
        BootstrapConfig {
            n_resamples: 200,
            scheme,
            seed: 7,
            parallel,
        }
    }

    #[test]
    fn max_drawdown_from_returns() {
        let dd = max_drawdown_of_returns([0.1, -0.5, 0.2]);
        assert!((dd + 0.5).abs() < 1e-12);
        assert_eq!(max_drawdown_of_returns([0.01, 0.02]), 0.0);
    }

    #[test]
    fn sequential_and_parallel_are_identical() {
        let s = lcg_returns(300, 1, 0.02);
        let b = lcg_returns(300, 2, 0.04);
        for scheme in [
            ResampleScheme::Iid,
            ResampleScheme::Block { block_length: 10 },
            ResampleScheme::default(),
        ] {
            let seq = drawdown_difference_test(&s, &b, &config(scheme, false)).unwrap();
            let par = drawdown_difference_test(&s, &b, &config(scheme, true)).unwrap();
            assert_eq!(seq, par, "{}", scheme.label());
        }
    }

    #[test]
    fn fixed_seed_is_deterministic_and_seed_matters() {
        let s = lcg_returns(300, 3, 0.02);
        let b = lcg_returns(300, 4, 0.04);
        let cfg = config(ResampleScheme::Iid, false);
        let a1 = drawdown_difference_test(&s, &b, &cfg).unwrap();
        let a2 = drawdown_difference_test(&s, &b, &cfg).unwrap();
        assert_eq!(a1, a2);
        let other = BootstrapConfig { seed: 8, ..cfg };
        let a3 = drawdown_difference_test(&s, &b, &other).unwrap();
        assert_ne!((a1.ci_lower, a1.ci_upper), (a3.ci_lower, a3.ci_upper));
    }

    #[test]
    fn identical_series_have_zero_difference_and_unit_p() {
        let s = lcg_returns(100, 5, 0.02);
        let r = drawdown_difference_test(&s, &s, &config(ResampleScheme::Iid, false)).unwrap();
        assert_eq!(r.observed_difference, 0.0);
        assert_eq!(r.p_value, 1.0);
        assert_eq!((r.ci_lower, r.ci_upper), (0.0, 0.0));
    }

    #[test]
    fn calmer_strategy_has_positive_difference() {
        let b = lcg_returns(500, 6, 0.04);
        let s: Vec<f64> = b.iter().map(|r| r * 0.25).collect();
        let r = drawdown_difference_test(&s, &b, &config(ResampleScheme::default(), true)).unwrap();
        assert!(r.observed_difference > 0.0);
        assert!(r.p_value > 0.0 && r.p_value <= 1.0);
        assert!(r.ci_lower <= r.ci_upper);
        assert!(r.ci_lower > 0.0, "shared indices keep the scaled series calmer");
    }

    #[test]
    fn block_indices_are_contiguous_within_blocks() {
        let mut rng = rng_for(1, 0);
        let idx = resample_indices(23, ResampleScheme::Block { block_length: 5 }, &mut rng);
        assert_eq!(idx.len(), 23);
        for (k, pair) in idx.windows(2).enumerate() {
            if k % 5 != 4 {
                assert_eq!(pair[1], (pair[0] + 1) % 23);
            }
        }
    }

    #[test]
    fn rejects_bad_input() {
        let cfg = config(ResampleScheme::Iid, false);
        assert_eq!(
            drawdown_difference_test(&[0.1, 0.2], &[0.1], &cfg).unwrap_err(),
            BootstrapError::LengthMismatch {
                strategy: 2,
                benchmark: 1
            }
        );
        assert!(matches!(
            drawdown_difference_test(&[0.1], &[0.1], &cfg),
            Err(BootstrapError::InsufficientData { .. })
        ));
        let zero_block = config(ResampleScheme::Block { block_length: 0 }, false);
        assert!(matches!(
            drawdown_difference_test(&[0.1, 0.2], &[0.1, 0.2], &zero_block),
            Err(BootstrapError::InvalidConfig(_))
        ));
    }
}
