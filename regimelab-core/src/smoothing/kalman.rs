//! Scalar local-level Kalman filter.
//!
//! State `x_t = x_{t-1} + w`, `w ~ N(0, Q)`; observation `z_t = x_t + v`,
//! `v ~ N(0, R)`. The filter starts at the first observation with variance
//! `P0` and outputs the filtered (not smoothed-backward) mean, so it is causal.

use super::{Smoother, SmoothingError};

#[derive(Debug, Clone)]
pub struct KalmanSmoother {
    process_variance: f64,
    observation_variance: f64,
    initial_variance: f64,
}

fn check_variance(name: &'static str, value: f64) -> Result<f64, SmoothingError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SmoothingError::InvalidVariance { name, value })
    }
}

impl KalmanSmoother {
    pub fn new(
        process_variance: f64,
        observation_variance: f64,
        initial_variance: f64,
    ) -> Result<Self, SmoothingError> {
        Ok(Self {
            process_variance: check_variance("process_variance", process_variance)?,
            observation_variance: check_variance("observation_variance", observation_variance)?,
            initial_variance: check_variance("initial_variance", initial_variance)?,
        })
    }

    /// Filtered means together with the posterior variance at each step.
    pub fn filter(&self, raw: &[f64]) -> Vec<(f64, f64)> {
        let Some(&first) = raw.first() else {
            return Vec::new();
        };
        let mut x = first;
        let mut p = self.initial_variance;
        let mut out = Vec::with_capacity(raw.len());

        for (i, &z) in raw.iter().enumerate() {
            if i > 0 {
                p += self.process_variance;
            }
            // Missing observation: predict only.
            if z.is_finite() {
                let gain = p / (p + self.observation_variance);
                x += gain * (z - x);
                p *= 1.0 - gain;
            }
            out.push((x, p));
        }
        out
    }
}

impl Smoother for KalmanSmoother {
    fn name(&self) -> &str {
        "kalman"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn smooth(&self, raw: &[f64]) -> Vec<Option<f64>> {
        self.filter(raw).into_iter().map(|(x, _)| Some(x)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_filter() -> KalmanSmoother {
        KalmanSmoother::new(0.01, 1.0, 1.0).unwrap()
    }

    #[test]
    fn starts_at_first_observation() {
        let out = default_filter().smooth(&[2.5, 0.0, 0.0]);
        assert_eq!(out[0], Some(2.5));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn hand_computed_second_step() {
        // Step 0: P = 1 -> K = 0.5, P = 0.5. Step 1: P = 0.51, K = 0.51/1.51.
        let out = default_filter().filter(&[1.0, 2.0]);
        let gain = 0.51 / 1.51;
        assert!((out[1].0 - (1.0 + gain)).abs() < 1e-12);
        assert!((out[1].1 - 0.51 * (1.0 - gain)).abs() < 1e-12);
    }

    #[test]
    fn constant_input_stays_constant() {
        let out = default_filter().smooth(&[0.7; 25]);
        assert!(out.iter().all(|v| *v == Some(0.7)));
    }

    #[test]
    fn damps_alternating_noise() {
        let raw: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let out = default_filter().smooth(&raw);
        let tail_max = out[30..].iter().flatten().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(tail_max < 1.0);
    }

    #[test]
    fn empty_input() {
        assert!(default_filter().smooth(&[]).is_empty());
    }
}
