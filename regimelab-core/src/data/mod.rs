//! Data collaborators: where indicator and price series come from.
//!
//! The core only depends on the `(date, value)` contract of
//! [`IndicatorSource`] and [`PriceSource`]; CSV and synthetic sources ship
//! alongside for the CLI and tests.

pub mod align;
pub mod csv;
pub mod provider;
pub mod resample;
pub mod synthetic;

pub use align::{forward_fill_union, inner_join, JoinedPrices};
pub use self::csv::{CsvIndicatorSource, CsvPriceSource};
pub use provider::{DataError, DataSource, DateRange, IndicatorSource, PriceSource};
pub use resample::resample_monthly_mean;
pub use synthetic::{SyntheticSource, DEFAULT_INDICATORS};
