//! Rolling z-score "surprise" of a macro indicator.
//!
//! The surprise at t is `(x_t - mean) / std` over the trailing window ending
//! at t (inclusive). Only observations at or before t enter the window, so
//! the value at t never depends on later data. Leading points without a full
//! window are `None`.

use std::collections::VecDeque;

use thiserror::Error;

use crate::domain::{IndicatorSeries, SurprisePoint, SurpriseSeries};

/// Relative spread below which a window counts as flat.
const DEGENERATE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum SurpriseError {
    #[error("rolling window must be >= 2, got {window}")]
    WindowTooSmall { window: usize },
    #[error("{indicator}: {observations} observations never fill a {window}-point window")]
    InsufficientHistory {
        indicator: String,
        observations: usize,
        window: usize,
    },
}

// ─── Sliding window accumulator ─────────────────────────────────────

/// Mean and sample standard deviation of a full window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub std: f64,
    /// Standard deviation is zero up to floating-point residue.
    pub degenerate: bool,
}

/// Fixed-capacity trailing window over an ordered stream.
///
/// Non-finite values are held as gaps; a window containing a gap yields no
/// statistics until the gap slides out.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
    gaps: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            gaps: 0,
        }
    }

    /// Slide the window forward by one value and return the statistics of
    /// the window ending at that value.
    pub fn push(&mut self, value: f64) -> Option<WindowStats> {
        if self.values.len() == self.capacity {
            if let Some(leaving) = self.values.pop_front() {
                if !leaving.is_finite() {
                    self.gaps -= 1;
                }
            }
        }
        if !value.is_finite() {
            self.gaps += 1;
        }
        self.values.push_back(value);

        if self.values.len() < self.capacity || self.gaps > 0 || self.capacity < 2 {
            return None;
        }
        Some(self.stats())
    }

    fn stats(&self) -> WindowStats {
        let n = self.values.len() as f64;
        let mean = self.values.iter().sum::<f64>() / n;
        let variance = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std = variance.sqrt();
        WindowStats {
            mean,
            std,
            degenerate: std <= DEGENERATE_TOLERANCE * mean.abs().max(1.0),
        }
    }
}

// ─── Calculator ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurpriseCalculator {
    window: usize,
}

impl SurpriseCalculator {
    pub fn new(window: usize) -> Result<Self, SurpriseError> {
        if window < 2 {
            return Err(SurpriseError::WindowTooSmall { window });
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Rolling z-scores of `series`, negated when a rise is unfavorable.
    ///
    /// A flat window gives exactly `0.0`. Fails only when no point at all has
    /// a full window.
    pub fn compute(
        &self,
        series: &IndicatorSeries,
        negate: bool,
    ) -> Result<SurpriseSeries, SurpriseError> {
        let mut window = RollingWindow::new(self.window);
        let mut degenerate_windows = 0;

        let points: Vec<SurprisePoint> = series
            .observations()
            .iter()
            .map(|obs| {
                let z = window.push(obs.value).map(|stats| {
                    if stats.degenerate {
                        degenerate_windows += 1;
                        return 0.0;
                    }
                    let z = (obs.value - stats.mean) / stats.std;
                    if negate {
                        -z
                    } else {
                        z
                    }
                });
                SurprisePoint { date: obs.date, z }
            })
            .collect();

        let result = SurpriseSeries {
            name: series.name.clone(),
            window: self.window,
            points,
            degenerate_windows,
        };

        if result.defined_count() == 0 {
            return Err(SurpriseError::InsufficientHistory {
                indicator: series.name.clone(),
                observations: series.len(),
                window: self.window,
            });
        }

        tracing::debug!(
            indicator = %series.name,
            window = self.window,
            defined = result.defined_count(),
            degenerate = degenerate_windows,
            "computed surprise series"
        );
        Ok(result)
    }
}
