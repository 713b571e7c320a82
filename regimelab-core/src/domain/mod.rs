//! Domain types: dated series, regimes, allocation weights, diagnostics.

pub mod diagnostics;
pub mod regime;
pub mod series;

pub use diagnostics::Diagnostic;
pub use regime::{
    AllocationWeights, Regime, SignalStrength, TargetWeight, WEIGHT_SUM_TOLERANCE,
};
pub use series::{
    IndicatorSeries, Observation, PricePoint, PriceSeries, SeriesError, SurprisePoint,
    SurpriseSeries,
};
