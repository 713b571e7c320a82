//! Smoothing strategies for the raw composite index.
//!
//! A smoother maps the raw composite to a series of the same length. Output
//! at position i may depend only on inputs at positions <= i; every smoother
//! must pass the truncated-vs-full series test.

mod kalman;
mod moving_average;

pub use kalman::KalmanSmoother;
pub use moving_average::MovingAverage;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SmoothingError {
    #[error("moving-average window must be >= 1, got {0}")]
    InvalidWindow(usize),
    #[error("Kalman {name} must be finite and positive, got {value}")]
    InvalidVariance { name: &'static str, value: f64 },
}

pub trait Smoother: Send + Sync {
    fn name(&self) -> &str;

    /// Leading outputs that are `None` before the smoother has enough input.
    fn lookback(&self) -> usize;

    /// Smooth the full raw series. Output has the same length as `raw`.
    fn smooth(&self, raw: &[f64]) -> Vec<Option<f64>>;
}

/// Serializable choice of smoothing strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SmoothingMethod {
    MovingAverage {
        window: usize,
    },
    Kalman {
        #[serde(default = "default_process_variance")]
        process_variance: f64,
        #[serde(default = "default_observation_variance")]
        observation_variance: f64,
        #[serde(default = "default_initial_variance")]
        initial_variance: f64,
    },
}

fn default_process_variance() -> f64 {
    0.01
}

fn default_observation_variance() -> f64 {
    1.0
}

fn default_initial_variance() -> f64 {
    1.0
}

impl Default for SmoothingMethod {
    fn default() -> Self {
        SmoothingMethod::MovingAverage { window: 3 }
    }
}

impl SmoothingMethod {
    pub fn kalman_defaults() -> Self {
        SmoothingMethod::Kalman {
            process_variance: default_process_variance(),
            observation_variance: default_observation_variance(),
            initial_variance: default_initial_variance(),
        }
    }

    /// Build the runtime smoother, validating its parameters.
    pub fn build(&self) -> Result<Box<dyn Smoother>, SmoothingError> {
        match *self {
            SmoothingMethod::MovingAverage { window } => Ok(Box::new(MovingAverage::new(window)?)),
            SmoothingMethod::Kalman {
                process_variance,
                observation_variance,
                initial_variance,
            } => Ok(Box::new(KalmanSmoother::new(
                process_variance,
                observation_variance,
                initial_variance,
            )?)),
        }
    }
}
