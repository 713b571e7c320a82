//! End-to-end run: indicators → surprises → composite signal → backtest →
//! benchmarks → validation, collected into one serializable result.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::data::{
    resample_monthly_mean, DataError, DataSource, DateRange, IndicatorSource, PriceSource,
};
use regimelab_core::domain::{
    Diagnostic, IndicatorSeries, PriceSeries, Regime, SignalStrength, SurpriseSeries,
};
use regimelab_core::engine::{benchmark_input, Benchmark};
use regimelab_core::metrics::rolling_sharpe;
use regimelab_core::{
    run_backtest, BacktestError, BacktestInput, BacktestOutput, CompositeSignal,
    PerformanceMetrics, RegimeSummary, RegimeThresholds, SignalError, SurpriseError,
};

use crate::config::{ConfigError, PipelineComponents, PipelineConfig};
use crate::validator::ValidationResult;

/// Version of the serialized [`PipelineResult`] layout.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("surprise for '{indicator}': {source}")]
    Surprise {
        indicator: String,
        #[source]
        source: SurpriseError,
    },
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
}

// ─── Tabular rows ────────────────────────────────────────────────────

/// One month of the signal table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRow {
    pub date: NaiveDate,
    /// Indicator levels after resampling, before any differencing.
    pub indicators: BTreeMap<String, Option<f64>>,
    pub surprises: BTreeMap<String, Option<f64>>,
    pub composite_raw: f64,
    pub composite_smoothed: Option<f64>,
    pub regime: Option<Regime>,
    pub strength: Option<SignalStrength>,
    pub risky_weight: Option<f64>,
    pub defensive_weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkDay {
    pub value: f64,
    pub daily_return: f64,
    pub cumulative_return: f64,
    pub drawdown: f64,
}

/// One trading day of the backtest table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub value: f64,
    pub daily_return: f64,
    pub cumulative_return: f64,
    pub drawdown: f64,
    pub risky_weight: f64,
    pub defensive_weight: f64,
    pub regime: Option<Regime>,
    pub rebalanced: bool,
    pub turnover: f64,
    pub cost: f64,
    pub rolling_sharpe: Option<f64>,
    /// Keyed by benchmark label.
    pub benchmarks: BTreeMap<String, BenchmarkDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub benchmark: Benchmark,
    pub metrics: PerformanceMetrics,
}

// ─── Results ─────────────────────────────────────────────────────────

/// Everything produced before prices are needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRun {
    pub source: DataSource,
    /// Monthly indicator levels, in configuration order.
    pub levels: Vec<IndicatorSeries>,
    pub surprises: Vec<SurpriseSeries>,
    pub composite: CompositeSignal,
    pub diagnostics: Vec<Diagnostic>,
}

impl SignalRun {
    pub fn monthly_rows(&self) -> Vec<MonthlyRow> {
        self.composite
            .points
            .iter()
            .map(|p| {
                let weights = p.regime.map(Regime::allocation);
                MonthlyRow {
                    date: p.date,
                    indicators: self
                        .levels
                        .iter()
                        .map(|s| (s.name.clone(), s.value_at(p.date)))
                        .collect(),
                    surprises: self
                        .surprises
                        .iter()
                        .map(|s| (s.name.clone(), s.at(p.date)))
                        .collect(),
                    composite_raw: p.raw,
                    composite_smoothed: p.smoothed,
                    regime: p.regime,
                    strength: p.strength,
                    risky_weight: weights.map(|w| w.risky),
                    defensive_weight: weights.map(|w| w.defensive),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub schema_version: u32,
    pub config_fingerprint: String,
    pub dataset_hash: String,
    pub data_source: DataSource,
    pub risky: String,
    pub defensive: String,
    pub smoother: String,
    pub thresholds: RegimeThresholds,
    pub regime_summary: RegimeSummary,
    pub split_date: NaiveDate,
    pub metrics: PerformanceMetrics,
    pub benchmarks: Vec<BenchmarkRun>,
    pub validation: ValidationResult,
    pub monthly: Vec<MonthlyRow>,
    pub daily: Vec<DailyRow>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PipelineResult {
    pub fn benchmark(&self, benchmark: Benchmark) -> Option<&BenchmarkRun> {
        self.benchmarks.iter().find(|b| b.benchmark == benchmark)
    }

    /// Strategy total return minus the benchmark's.
    pub fn alpha_vs(&self, benchmark: Benchmark) -> Option<f64> {
        self.benchmark(benchmark)
            .map(|b| self.metrics.total_return - b.metrics.total_return)
    }

    pub fn effective_start(&self) -> Option<NaiveDate> {
        self.diagnostics.iter().find_map(|d| match d {
            Diagnostic::EffectiveStart { date, .. } => Some(*date),
            _ => None,
        })
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────

/// A validated configuration bound to its runtime components.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    components: PipelineComponents,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let components = config.build()?;
        Ok(Self { config, components })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch indicators and build the composite signal.
    pub fn signals(
        &self,
        source: &dyn IndicatorSource,
        range: DateRange,
    ) -> Result<SignalRun, PipelineError> {
        let raw = source.fetch_indicators(&self.config.indicator_names(), range)?;
        tracing::info!(
            indicators = raw.len(),
            source = ?source.source(),
            "fetched indicators"
        );

        let mut levels = Vec::with_capacity(raw.len());
        let mut surprises = Vec::with_capacity(raw.len());
        for (indicator, series) in self.config.indicators.iter().zip(&raw) {
            let level = if indicator.resample_monthly {
                resample_monthly_mean(series)
            } else {
                series.clone()
            };
            let prepared = indicator.apply_transform(&level);
            let surprise = self
                .components
                .calculator
                .compute(&prepared, indicator.negate)
                .map_err(|source| PipelineError::Surprise {
                    indicator: indicator.name.clone(),
                    source,
                })?;
            levels.push(level);
            surprises.push(surprise);
        }

        let mut diagnostics: Vec<Diagnostic> =
            surprises.iter().flat_map(SurpriseSeries::diagnostics).collect();
        let composite = self.components.generator.generate(&surprises)?;
        diagnostics.extend(composite.diagnostics.iter().cloned());

        Ok(SignalRun {
            source: source.source(),
            levels,
            surprises,
            composite,
            diagnostics,
        })
    }

    /// Full run: signal, strategy backtest, benchmarks and validation.
    pub fn run(
        &self,
        indicators: &dyn IndicatorSource,
        prices: &dyn PriceSource,
        range: DateRange,
    ) -> Result<PipelineResult, PipelineError> {
        let signals = self.signals(indicators, range)?;
        let assets = &self.config.assets;
        let (risky, defensive) = prices.fetch_prices(&assets.risky, &assets.defensive, range)?;
        tracing::info!(
            days = risky.len(),
            risky = %risky.symbol,
            defensive = %defensive.symbol,
            "fetched prices"
        );
        let dataset_hash = dataset_hash(&signals.levels, &risky, &defensive);

        let input = BacktestInput {
            targets: signals.composite.target_weights(),
            risky,
            defensive,
            config: *self.components.engine.config(),
        };
        let strategy = run_backtest(&input)?;

        let mut benchmark_outputs = Vec::new();
        if self.config.backtest.benchmarks {
            for benchmark in Benchmark::ALL {
                let output = run_backtest(&benchmark_input(benchmark, &input))?;
                benchmark_outputs.push((benchmark, output));
            }
        }

        let split_date = self
            .config
            .validation
            .split_date
            .or_else(|| midpoint(&input.risky))
            .unwrap_or(NaiveDate::MIN);
        let validator = &self.components.validator;
        let drawdown_benchmark = validator.config().benchmark;
        let fallback;
        let benchmark = match benchmark_outputs.iter().find(|(b, _)| *b == drawdown_benchmark) {
            Some((_, output)) => Ok(output),
            None => {
                fallback = run_backtest(&benchmark_input(drawdown_benchmark, &input));
                fallback.as_ref()
            }
        };
        let validation =
            validator.validate_runs(&run_backtest, &input, &strategy, benchmark, Some(split_date));

        let mut diagnostics = signals.diagnostics.clone();
        diagnostics.extend(strategy.diagnostics.iter().cloned());
        for d in &diagnostics {
            tracing::warn!(diagnostic = %d, "data diagnostic");
        }

        let daily = daily_rows(
            &strategy,
            &benchmark_outputs,
            self.config.backtest.rolling_sharpe_window,
            &input,
        );
        tracing::info!(
            total_return = strategy.metrics.total_return,
            sharpe = ?strategy.metrics.sharpe,
            max_drawdown = strategy.metrics.max_drawdown,
            rebalances = strategy.metrics.rebalance_count,
            "pipeline complete"
        );

        Ok(PipelineResult {
            schema_version: SCHEMA_VERSION,
            config_fingerprint: self.config.fingerprint()?,
            dataset_hash,
            data_source: signals.source,
            risky: input.risky.symbol.clone(),
            defensive: input.defensive.symbol.clone(),
            smoother: signals.composite.smoother.clone(),
            thresholds: signals.composite.thresholds,
            regime_summary: signals.composite.regime_summary(),
            split_date,
            metrics: strategy.metrics.clone(),
            benchmarks: benchmark_outputs
                .iter()
                .map(|(benchmark, output)| BenchmarkRun {
                    benchmark: *benchmark,
                    metrics: output.metrics.clone(),
                })
                .collect(),
            validation,
            monthly: signals.monthly_rows(),
            daily,
            diagnostics,
        })
    }
}

/// Build and run a pipeline in one call.
pub fn run_pipeline(
    config: &PipelineConfig,
    indicators: &dyn IndicatorSource,
    prices: &dyn PriceSource,
    range: DateRange,
) -> Result<PipelineResult, PipelineError> {
    Pipeline::new(config.clone())?.run(indicators, prices, range)
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn midpoint(prices: &PriceSeries) -> Option<NaiveDate> {
    prices.points().get(prices.len() / 2).map(|p| p.date)
}

fn daily_rows(
    strategy: &BacktestOutput,
    benchmarks: &[(Benchmark, BacktestOutput)],
    window: usize,
    input: &BacktestInput,
) -> Vec<DailyRow> {
    let rolling = rolling_sharpe(
        &strategy.returns(),
        window,
        f64::from(input.config.trading_days_per_year),
        input.config.risk_free_rate,
    );

    strategy
        .records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let benchmarks = benchmarks
                .iter()
                .filter_map(|(benchmark, output)| {
                    let b = output.records.get(i).filter(|b| b.date == r.date)?;
                    Some((
                        benchmark.label().to_string(),
                        BenchmarkDay {
                            value: b.value,
                            daily_return: b.daily_return,
                            cumulative_return: b.cumulative_return,
                            drawdown: b.drawdown,
                        },
                    ))
                })
                .collect();
            DailyRow {
                date: r.date,
                value: r.value,
                daily_return: r.daily_return,
                cumulative_return: r.cumulative_return,
                drawdown: r.drawdown,
                risky_weight: r.risky_weight,
                defensive_weight: r.defensive_weight,
                regime: r.regime,
                rebalanced: r.rebalanced,
                turnover: r.turnover,
                cost: r.cost,
                rolling_sharpe: i.checked_sub(1).and_then(|k| rolling.get(k).copied().flatten()),
                benchmarks,
            }
        })
        .collect()
}

/// BLAKE3 over every indicator observation and price, in a fixed order.
fn dataset_hash(levels: &[IndicatorSeries], risky: &PriceSeries, defensive: &PriceSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for series in levels {
        hasher.update(series.name.as_bytes());
        for o in series.observations() {
            hasher.update(o.date.to_string().as_bytes());
            hasher.update(&o.value.to_le_bytes());
        }
    }
    for prices in [risky, defensive] {
        hasher.update(prices.symbol.as_bytes());
        for p in prices.points() {
            hasher.update(p.date.to_string().as_bytes());
            hasher.update(&p.price.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
