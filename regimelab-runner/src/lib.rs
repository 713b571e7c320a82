//! RegimeLab Runner — configuration, validation, orchestration and export.
//!
//! This crate builds on `regimelab-core` to provide:
//! - TOML pipeline configuration with defaults and fingerprinting
//! - Statistical primitives (Student t, Welch, Newey-West)
//! - Seeded drawdown bootstrap (i.i.d., fixed block, stationary block)
//! - Walk-forward split validation and the statistical validator
//! - End-to-end pipeline producing monthly and daily tables
//! - JSON, CSV and Markdown artifacts

pub mod bootstrap;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod stats;
pub mod validator;
pub mod walk_forward;

pub use bootstrap::{
    drawdown_difference_test, BootstrapConfig, BootstrapError, DrawdownBootstrap, ResampleScheme,
};
pub use config::{ConfigError, IndicatorConfig, PipelineComponents, PipelineConfig, Transform};
pub use export::{load_artifacts, save_artifacts, save_signals, ArtifactPaths};
pub use pipeline::{
    run_pipeline, DailyRow, MonthlyRow, Pipeline, PipelineError, PipelineResult, SignalRun,
    SCHEMA_VERSION,
};
pub use stats::{newey_west_test, welch_t_test, NeweyWestTest, TestOutcome, WelchTest};
pub use validator::{StatisticalValidator, ValidationConfig, ValidationResult};
pub use walk_forward::{walk_forward, Segment, SegmentResult, WalkForwardResult};
