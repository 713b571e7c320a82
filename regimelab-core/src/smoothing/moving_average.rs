//! Trailing simple moving average.
//!
//! Lookback: window - 1 (first value at index window-1).

use super::{Smoother, SmoothingError};

#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    name: String,
}

impl MovingAverage {
    pub fn new(window: usize) -> Result<Self, SmoothingError> {
        if window == 0 {
            return Err(SmoothingError::InvalidWindow(window));
        }
        Ok(Self {
            window,
            name: format!("sma_{window}"),
        })
    }
}

impl Smoother for MovingAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn smooth(&self, raw: &[f64]) -> Vec<Option<f64>> {
        let w = self.window;
        (0..raw.len())
            .map(|i| {
                if i + 1 < w {
                    return None;
                }
                let sum: f64 = raw[i + 1 - w..=i].iter().sum();
                Some(sum / w as f64)
            })
            .collect()
    }
}
