//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: the full `PipelineResult` with schema versioning
//! - **CSV**: the monthly signal table and the daily backtest table
//! - **Markdown**: a human-readable summary with benchmark alpha and the
//!   validation tests
//!
//! Unknown (newer) schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use regimelab_core::domain::{Regime, SignalStrength};
use regimelab_core::data::DataSource;
use regimelab_core::engine::Benchmark;
use regimelab_core::PerformanceMetrics;

use crate::pipeline::{BenchmarkRun, DailyRow, MonthlyRow, PipelineResult, SCHEMA_VERSION};
use crate::stats::TestOutcome;
use crate::walk_forward::SegmentResult;

pub const SIGNALS_CSV: &str = "employment_signals.csv";
pub const BACKTEST_CSV: &str = "full_backtest_results.csv";
pub const RESULT_JSON: &str = "result.json";
pub const REPORT_MD: &str = "report.md";

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &PipelineResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize PipelineResult to JSON")
}

/// Deserialize a `PipelineResult`, rejecting schema versions newer than ours.
pub fn import_json(json: &str) -> Result<PipelineResult> {
    let result: PipelineResult =
        serde_json::from_str(json).context("failed to deserialize PipelineResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(String::new, |v| format!("{v:.precision$}"))
}

fn regime_cell(regime: Option<Regime>) -> &'static str {
    regime.map_or("", Regime::label)
}

fn strength_cell(strength: Option<SignalStrength>) -> &'static str {
    strength.map_or("", SignalStrength::label)
}

/// Monthly signal table.
///
/// Columns: date, one column per indicator level, one `<name>_surprise`
/// column per indicator, composite_raw, composite_smoothed, regime, strength,
/// risky_weight, defensive_weight. Blank cells are undefined values.
pub fn export_signals_csv(rows: &[MonthlyRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let names: Vec<String> = rows
        .first()
        .map(|r| r.indicators.keys().cloned().collect())
        .unwrap_or_default();

    let mut header = vec!["date".to_string()];
    header.extend(names.iter().cloned());
    header.extend(names.iter().map(|n| format!("{n}_surprise")));
    header.extend(
        [
            "composite_raw",
            "composite_smoothed",
            "regime",
            "strength",
            "risky_weight",
            "defensive_weight",
        ]
        .map(String::from),
    );
    wtr.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.date.to_string()];
        for name in &names {
            record.push(opt(row.indicators.get(name).copied().flatten(), 6));
        }
        for name in &names {
            record.push(opt(row.surprises.get(name).copied().flatten(), 6));
        }
        record.push(format!("{:.6}", row.composite_raw));
        record.push(opt(row.composite_smoothed, 6));
        record.push(regime_cell(row.regime).to_string());
        record.push(strength_cell(row.strength).to_string());
        record.push(opt(row.risky_weight, 2));
        record.push(opt(row.defensive_weight, 2));
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Daily backtest table, with four columns per benchmark present.
pub fn export_backtest_csv(rows: &[DailyRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let benchmarks: Vec<String> = rows
        .first()
        .map(|r| r.benchmarks.keys().cloned().collect())
        .unwrap_or_default();

    let mut header: Vec<String> = [
        "date",
        "value",
        "daily_return",
        "cumulative_return",
        "drawdown",
        "risky_weight",
        "defensive_weight",
        "regime",
        "rebalanced",
        "turnover",
        "cost",
        "rolling_sharpe",
    ]
    .map(String::from)
    .to_vec();
    for b in &benchmarks {
        for column in ["value", "daily_return", "cumulative_return", "drawdown"] {
            header.push(format!("{b}_{column}"));
        }
    }
    wtr.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.date.to_string(),
            format!("{:.2}", row.value),
            format!("{:.8}", row.daily_return),
            format!("{:.8}", row.cumulative_return),
            format!("{:.8}", row.drawdown),
            format!("{:.4}", row.risky_weight),
            format!("{:.4}", row.defensive_weight),
            regime_cell(row.regime).to_string(),
            row.rebalanced.to_string(),
            format!("{:.4}", row.turnover),
            format!("{:.2}", row.cost),
            opt(row.rolling_sharpe, 4),
        ];
        for b in &benchmarks {
            match row.benchmarks.get(b) {
                Some(day) => {
                    record.push(format!("{:.2}", day.value));
                    record.push(format!("{:.8}", day.daily_return));
                    record.push(format!("{:.8}", day.cumulative_return));
                    record.push(format!("{:.8}", day.drawdown));
                }
                None => record.extend(std::iter::repeat(String::new()).take(4)),
            }
        }
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown report ────────────────────────────────────────────────

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn opt_pct(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".into(), pct)
}

fn opt_f3(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".into(), |x| format!("{x:.3}"))
}

fn metric_row(
    md: &mut String,
    name: &str,
    strategy: String,
    benchmarks: &[BenchmarkRun],
    value: impl Fn(&PerformanceMetrics) -> String,
) {
    md.push_str(&format!("| {name} | {strategy} |"));
    for b in benchmarks {
        md.push_str(&format!(" {} |", value(&b.metrics)));
    }
    md.push('\n');
}

fn outcome_line<T>(name: &str, outcome: &TestOutcome<T>, describe: impl Fn(&T) -> String) -> String {
    match outcome {
        TestOutcome::Computed(t) => format!("| {name} | {} |\n", describe(t)),
        TestOutcome::NotApplicable { reason } => format!("| {name} | not applicable: {reason} |\n"),
    }
}

pub fn generate_report(result: &PipelineResult) -> String {
    let mut md = String::with_capacity(4096);

    md.push_str("# Employment Regime Backtest\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Assets | {} / {} |\n", result.risky, result.defensive));
    if let (Some(first), Some(last)) = (result.daily.first(), result.daily.last()) {
        md.push_str(&format!("| Period | {} to {} |\n", first.date, last.date));
    }
    md.push_str(&format!("| Smoother | {} |\n", result.smoother));
    md.push_str(&format!(
        "| Thresholds | {:+.2} / {:+.2} |\n",
        result.thresholds.upper, result.thresholds.lower
    ));
    md.push_str(&format!("| Config Fingerprint | {} |\n", result.config_fingerprint));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    if result.data_source == DataSource::Synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    let s = &result.regime_summary;
    md.push_str("## Regime Distribution\n\n");
    md.push_str("| Regime | Months | Share |\n");
    md.push_str("| --- | ---: | ---: |\n");
    for regime in [Regime::RiskOn, Regime::Neutral, Regime::RiskOff] {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            regime.label(),
            s.count(regime),
            opt_pct(s.percentage(regime))
        ));
    }
    md.push('\n');

    let m = &result.metrics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Strategy |");
    for b in &result.benchmarks {
        md.push_str(&format!(" {} |", b.benchmark.label()));
    }
    md.push_str("\n| --- | ---: |");
    for _ in &result.benchmarks {
        md.push_str(" ---: |");
    }
    md.push('\n');
    let b = &result.benchmarks;
    metric_row(&mut md, "Total Return", pct(m.total_return), b, |x| pct(x.total_return));
    metric_row(&mut md, "CAGR", opt_pct(m.cagr), b, |x| opt_pct(x.cagr));
    metric_row(&mut md, "Volatility", opt_pct(m.annualized_volatility), b, |x| {
        opt_pct(x.annualized_volatility)
    });
    metric_row(&mut md, "Sharpe", opt_f3(m.sharpe), b, |x| opt_f3(x.sharpe));
    metric_row(&mut md, "Sortino", opt_f3(m.sortino), b, |x| opt_f3(x.sortino));
    metric_row(&mut md, "Calmar", opt_f3(m.calmar), b, |x| opt_f3(x.calmar));
    metric_row(&mut md, "Max Drawdown", pct(m.max_drawdown), b, |x| pct(x.max_drawdown));
    metric_row(&mut md, "Win Rate", opt_pct(m.win_rate), b, |x| opt_pct(x.win_rate));
    metric_row(&mut md, "Rebalances", m.rebalance_count.to_string(), b, |x| {
        x.rebalance_count.to_string()
    });
    metric_row(&mut md, "Turnover", format!("{:.2}", m.turnover), b, |x| {
        format!("{:.2}", x.turnover)
    });
    md.push('\n');

    if !result.benchmarks.is_empty() {
        md.push_str("## Alpha\n\n");
        for benchmark in Benchmark::ALL {
            if let Some(alpha) = result.alpha_vs(benchmark) {
                md.push_str(&format!("- vs {}: {:+.2}%\n", benchmark.label(), alpha * 100.0));
            }
        }
        md.push('\n');
    }

    let v = &result.validation;
    md.push_str("## Statistical Validation\n\n");
    md.push_str("| Test | Result |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&outcome_line("Walk-forward", &v.walk_forward, |wf| {
        let sharpe = |o: &TestOutcome<SegmentResult>| {
            o.computed().map_or_else(|| "n/a".into(), |s| opt_f3(s.metrics.sharpe))
        };
        format!(
            "split {}: in-sample Sharpe {}, out-of-sample Sharpe {}, gap {}",
            wf.split_date,
            sharpe(&wf.in_sample),
            sharpe(&wf.out_of_sample),
            opt_f3(wf.sharpe_gap)
        )
    }));
    md.push_str(&outcome_line("Newey-West", &v.newey_west, |t| {
        format!(
            "t = {:.3}, p = {:.4} ({} lags, n = {})",
            t.t_statistic, t.p_value, t.lags, t.observations
        )
    }));
    md.push_str(&outcome_line("Drawdown bootstrap", &v.drawdown_bootstrap, |b| {
        format!(
            "difference {} (90% CI {} to {}), p = {:.4}, {} resamples, {}",
            pct(b.observed_difference),
            pct(b.ci_lower),
            pct(b.ci_upper),
            b.p_value,
            b.n_resamples,
            b.scheme.label()
        )
    }));
    md.push_str(&outcome_line("Welch RiskOn vs RiskOff", &v.regime_welch, |w| {
        format!(
            "t = {:.3}, p = {:.4} (n = {} / {})",
            w.t_statistic, w.p_value, w.n_a, w.n_b
        )
    }));
    md.push('\n');

    if !result.diagnostics.is_empty() {
        md.push_str("## Data Quality\n\n");
        for d in &result.diagnostics {
            md.push_str(&format!("- {d}\n"));
        }
        md.push('\n');
    }

    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub signals_csv: PathBuf,
    pub backtest_csv: PathBuf,
    pub result_json: PathBuf,
    pub report_md: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            signals_csv: dir.join(SIGNALS_CSV),
            backtest_csv: dir.join(BACKTEST_CSV),
            result_json: dir.join(RESULT_JSON),
            report_md: dir.join(REPORT_MD),
        }
    }
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the four artifacts into `output_dir`, creating it if needed.
pub fn save_artifacts(result: &PipelineResult, output_dir: &Path) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;
    let paths = ArtifactPaths::in_dir(output_dir);

    write(&paths.signals_csv, &export_signals_csv(&result.monthly)?)?;
    write(&paths.backtest_csv, &export_backtest_csv(&result.daily)?)?;
    write(&paths.result_json, &export_json(result)?)?;
    write(&paths.report_md, &generate_report(result))?;

    tracing::info!(dir = %output_dir.display(), "saved artifacts");
    Ok(paths)
}

/// Only the monthly signal table, for runs without prices.
pub fn save_signals(rows: &[MonthlyRow], output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;
    let path = output_dir.join(SIGNALS_CSV);
    write(&path, &export_signals_csv(rows)?)?;
    Ok(path)
}

/// Load a result from an artifact directory's `result.json`.
pub fn load_artifacts(dir: &Path) -> Result<PipelineResult> {
    let path = dir.join(RESULT_JSON);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
