//! Pipeline configuration loaded from TOML.
//!
//! Every section has defaults, so an empty file is a valid configuration:
//!
//! ```toml
//! [signal]
//! lookback_window = 12
//! theta = 0.5
//! smoothing = { method = "moving_average", window = 3 }
//!
//! [[indicators]]
//! name = "UNRATE"
//! weight = 0.4
//! negate = true
//!
//! [backtest]
//! cost_bps = 5.0
//! rebalance = "monthly"
//!
//! [validation]
//! split_date = "2018-01-01"
//! bootstrap = { n_resamples = 1000, scheme = { kind = "stationary", mean_block_length = 20 } }
//! ```
//!
//! [`PipelineConfig::build`] turns the file into runtime components and
//! reports every configuration-shape error before any data is touched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::domain::IndicatorSeries;
use regimelab_core::engine::Benchmark;
use regimelab_core::smoothing::SmoothingError;
use regimelab_core::{
    BacktestConfig, BacktestEngine, BacktestError, RebalanceRule, RegimeThresholds, SignalError,
    SignalGenerator, SmoothingMethod, SurpriseCalculator, SurpriseError,
};

use crate::bootstrap::{BootstrapConfig, BootstrapError};
use crate::validator::{StatisticalValidator, ValidationConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to fingerprint configuration: {0}")]
    Fingerprint(#[from] serde_json::Error),
    #[error("no indicators configured")]
    NoIndicators,
    #[error("indicator '{0}' configured more than once")]
    DuplicateIndicator(String),
    #[error("thresholds: {0}")]
    Thresholds(String),
    #[error("rolling Sharpe window must be >= 2, got {0}")]
    RollingWindow(usize),
    #[error("assets: {0}")]
    Assets(String),
    #[error(transparent)]
    Surprise(#[from] SurpriseError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Smoothing(#[from] SmoothingError),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

// ─── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSection {
    /// Rolling z-score window, in observations.
    pub lookback_window: usize,
    pub smoothing: SmoothingMethod,
    /// Symmetric threshold: RiskOn above +theta, RiskOff below -theta.
    pub theta: f64,
    /// Asymmetric bounds; when both are set they replace `theta`.
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

impl Default for SignalSection {
    fn default() -> Self {
        Self {
            lookback_window: 12,
            smoothing: SmoothingMethod::default(),
            theta: 0.5,
            upper: None,
            lower: None,
        }
    }
}

impl SignalSection {
    pub fn thresholds(&self) -> Result<RegimeThresholds, ConfigError> {
        match (self.upper, self.lower) {
            (Some(upper), Some(lower)) => Ok(RegimeThresholds::new(upper, lower)?),
            (None, None) => Ok(RegimeThresholds::symmetric(self.theta)?),
            _ => Err(ConfigError::Thresholds(
                "set both upper and lower, or neither".into(),
            )),
        }
    }
}

/// How an indicator is prepared before its surprise is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    #[default]
    Level,
    /// Month-over-month change.
    Difference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub name: String,
    pub weight: f64,
    /// Flip the sign so that a positive surprise is risk-on.
    #[serde(default)]
    pub negate: bool,
    #[serde(default)]
    pub transform: Transform,
    /// Average higher-frequency observations onto the first of each month.
    #[serde(default)]
    pub resample_monthly: bool,
}

impl IndicatorConfig {
    fn new(name: &str, weight: f64, negate: bool) -> Self {
        Self {
            name: name.to_string(),
            weight,
            negate,
            transform: Transform::Level,
            resample_monthly: false,
        }
    }

    /// Apply the configured transform to an already resampled series.
    pub fn apply_transform(&self, series: &IndicatorSeries) -> IndicatorSeries {
        match self.transform {
            Transform::Level => series.clone(),
            Transform::Difference => series.difference(),
        }
    }
}

pub fn default_indicators() -> Vec<IndicatorConfig> {
    vec![
        IndicatorConfig::new("UNRATE", 0.4, true),
        IndicatorConfig {
            resample_monthly: true,
            ..IndicatorConfig::new("ICSA", 0.3, true)
        },
        IndicatorConfig {
            transform: Transform::Difference,
            ..IndicatorConfig::new("PAYEMS", 0.2, false)
        },
        IndicatorConfig::new("CIVPART", 0.1, false),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub cost_bps: f64,
    pub rebalance: RebalanceRule,
    pub trading_days_per_year: u32,
    /// Annual rate as a fraction.
    pub risk_free_rate: f64,
    pub initial_capital: f64,
    /// Also run the buy-and-hold and 60/40 benchmarks.
    pub benchmarks: bool,
    /// Trailing window, in trading days, of the rolling Sharpe column.
    pub rolling_sharpe_window: usize,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let engine = BacktestConfig::default();
        Self {
            cost_bps: engine.cost_bps,
            rebalance: engine.rebalance,
            trading_days_per_year: engine.trading_days_per_year,
            risk_free_rate: engine.risk_free_rate,
            initial_capital: engine.initial_capital,
            benchmarks: true,
            rolling_sharpe_window: 252,
        }
    }
}

impl BacktestSection {
    pub fn engine_config(&self) -> BacktestConfig {
        BacktestConfig {
            cost_bps: self.cost_bps,
            rebalance: self.rebalance,
            trading_days_per_year: self.trading_days_per_year,
            risk_free_rate: self.risk_free_rate,
            initial_capital: self.initial_capital,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    /// Walk-forward split; `None` splits at the middle of the price history.
    pub split_date: Option<NaiveDate>,
    pub newey_west_lags: Option<usize>,
    pub benchmark: Benchmark,
    pub bootstrap: BootstrapConfig,
}

impl Default for ValidationSection {
    fn default() -> Self {
        let defaults = ValidationConfig::default();
        Self {
            split_date: None,
            newey_west_lags: defaults.newey_west_lags,
            benchmark: defaults.benchmark,
            bootstrap: defaults.bootstrap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsSection {
    pub risky: String,
    pub defensive: String,
}

impl Default for AssetsSection {
    fn default() -> Self {
        Self {
            risky: "SPY".into(),
            defensive: "TLT".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

// ─── Top level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub signal: SignalSection,
    pub indicators: Vec<IndicatorConfig>,
    pub backtest: BacktestSection,
    pub validation: ValidationSection,
    pub assets: AssetsSection,
    pub logging: LoggingSection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            signal: SignalSection::default(),
            indicators: default_indicators(),
            backtest: BacktestSection::default(),
            validation: ValidationSection::default(),
            assets: AssetsSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// Runtime components built from a validated configuration.
#[derive(Debug)]
pub struct PipelineComponents {
    pub calculator: SurpriseCalculator,
    pub generator: SignalGenerator,
    pub engine: BacktestEngine,
    pub validator: StatisticalValidator,
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Content hash of the configuration (BLAKE3 over its JSON form).
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    pub fn indicator_names(&self) -> Vec<String> {
        self.indicators.iter().map(|i| i.name.clone()).collect()
    }

    pub fn combination_weights(&self) -> BTreeMap<String, f64> {
        self.indicators
            .iter()
            .map(|i| (i.name.clone(), i.weight))
            .collect()
    }

    /// Check the whole configuration without keeping the components.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build().map(|_| ())
    }

    /// Validate every section and build the runtime components.
    pub fn build(&self) -> Result<PipelineComponents, ConfigError> {
        if self.indicators.is_empty() {
            return Err(ConfigError::NoIndicators);
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = self.indicators.iter().find(|i| !seen.insert(i.name.as_str())) {
            return Err(ConfigError::DuplicateIndicator(dup.name.clone()));
        }
        if self.assets.risky.is_empty()
            || self.assets.defensive.is_empty()
            || self.assets.risky == self.assets.defensive
        {
            return Err(ConfigError::Assets(format!(
                "need two distinct symbols, got '{}' and '{}'",
                self.assets.risky, self.assets.defensive
            )));
        }
        if self.backtest.rolling_sharpe_window < 2 {
            return Err(ConfigError::RollingWindow(self.backtest.rolling_sharpe_window));
        }

        let calculator = SurpriseCalculator::new(self.signal.lookback_window)?;
        let thresholds = self.signal.thresholds()?;
        let smoother = self.signal.smoothing.build()?;
        let generator = SignalGenerator::new(self.combination_weights(), smoother, thresholds)?;
        let engine = BacktestEngine::new(self.backtest.engine_config())?;
        self.validation.bootstrap.validate()?;
        let validator = StatisticalValidator::new(ValidationConfig {
            bootstrap: self.validation.bootstrap.clone(),
            newey_west_lags: self.validation.newey_west_lags,
            benchmark: self.validation.benchmark,
        });

        Ok(PipelineComponents {
            calculator,
            generator,
            engine,
            validator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::ResampleScheme;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        let weights: f64 = config.indicators.iter().map(|i| i.weight).sum();
        assert!((weights - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(PipelineConfig::from_toml("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = PipelineConfig::default();
        config.validation.split_date = NaiveDate::from_ymd_opt(2018, 1, 1);
        config.signal.smoothing = SmoothingMethod::kalman_defaults();
        config.validation.bootstrap.scheme = ResampleScheme::Block { block_length: 10 };
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn parses_partial_file() {
        let text = r#"
            [signal]
            lookback_window = 24
            smoothing = { method = "kalman", process_variance = 0.05 }

            [[indicators]]
            name = "UNRATE"
            weight = 1.0
            negate = true

            [backtest]
            cost_bps = 10.0
            rebalance = "on_signal"

            [validation]
            split_date = "2019-06-01"
            bootstrap = { n_resamples = 500, scheme = { kind = "iid" } }
        "#;
        let config = PipelineConfig::from_toml(text).unwrap();
        assert_eq!(config.signal.lookback_window, 24);
        assert_eq!(config.signal.theta, 0.5);
        assert_eq!(
            config.signal.smoothing,
            SmoothingMethod::Kalman {
                process_variance: 0.05,
                observation_variance: 1.0,
                initial_variance: 1.0
            }
        );
        assert_eq!(config.indicators.len(), 1);
        assert_eq!(config.indicators[0].transform, Transform::Level);
        assert_eq!(config.backtest.rebalance, RebalanceRule::OnSignal);
        assert_eq!(config.backtest.trading_days_per_year, 252);
        assert_eq!(config.validation.split_date, NaiveDate::from_ymd_opt(2019, 6, 1));
        assert_eq!(config.validation.bootstrap.scheme, ResampleScheme::Iid);
        assert_eq!(config.validation.bootstrap.seed, 42);
        config.validate().unwrap();
    }

    #[test]
    fn weights_not_summing_to_one_rejected() {
        let mut config = PipelineConfig::default();
        config.indicators[0].weight = 0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Signal(SignalError::InvalidWeights(_)))
        ));
    }

    #[test]
    fn non_positive_theta_rejected() {
        for theta in [0.0, -0.5] {
            let mut config = PipelineConfig::default();
            config.signal.theta = theta;
            assert!(matches!(config.validate(), Err(ConfigError::Signal(_))));
        }
    }

    #[test]
    fn half_specified_asymmetric_thresholds_rejected() {
        let mut config = PipelineConfig::default();
        config.signal.upper = Some(0.7);
        assert!(matches!(config.validate(), Err(ConfigError::Thresholds(_))));
        config.signal.lower = Some(-0.3);
        config.validate().unwrap();
    }

    #[test]
    fn other_shape_errors_reported() {
        let mut config = PipelineConfig::default();
        config.indicators.push(config.indicators[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateIndicator(_))));

        let mut config = PipelineConfig::default();
        config.signal.lookback_window = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Surprise(_))));

        let mut config = PipelineConfig::default();
        config.backtest.cost_bps = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Backtest(_))));

        let mut config = PipelineConfig::default();
        config.validation.bootstrap.n_resamples = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Bootstrap(_))));

        let mut config = PipelineConfig::default();
        config.assets.defensive = "SPY".into();
        assert!(matches!(config.validate(), Err(ConfigError::Assets(_))));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = PipelineConfig::default();
        let mut b = PipelineConfig::default();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.backtest.cost_bps = 7.5;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
