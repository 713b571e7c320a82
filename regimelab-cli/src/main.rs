//! RegimeLab CLI — employment-surprise regime backtests from the terminal.
//!
//! Commands:
//! - `run` — full pipeline on CSV indicators and prices, artifacts saved
//! - `demo` — full pipeline on seeded synthetic data
//! - `signals` — monthly signal table only, no prices needed
//! - `init-config` — write the default configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use regimelab_core::data::{CsvIndicatorSource, CsvPriceSource, DateRange, SyntheticSource};
use regimelab_core::engine::Benchmark;
use regimelab_runner::config::LoggingSection;
use regimelab_runner::{
    save_artifacts, save_signals, MonthlyRow, Pipeline, PipelineConfig, PipelineResult,
    TestOutcome,
};

#[derive(Parser)]
#[command(
    name = "regimelab",
    about = "RegimeLab CLI — employment-surprise regime allocation backtests"
)]
struct Cli {
    /// Log filter (e.g. info, debug, regimelab_runner=trace). RUST_LOG wins.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on CSV inputs.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Wide indicator CSV: date plus one column per indicator.
        #[arg(long)]
        indicators: PathBuf,

        /// Price CSV: date,<risky>,<defensive>.
        #[arg(long)]
        prices: PathBuf,

        /// First date to load (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date to load (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Output directory for CSV, JSON and Markdown artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run the full pipeline on seeded synthetic data.
    Demo {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// First date (YYYY-MM-DD). Defaults to 2010-01-01.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date (YYYY-MM-DD). Defaults to 2024-12-31.
        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Print and save the monthly signal table.
    Signals {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        indicators: PathBuf,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Write the default configuration to a TOML file.
    InitConfig {
        #[arg(long, default_value = "regimelab.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            indicators,
            prices,
            start,
            end,
            output_dir,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(cli.log_level.as_deref(), cli.log_json, &config.logging);
            let pipeline = Pipeline::new(config)?;
            let result = pipeline.run(
                &CsvIndicatorSource::new(indicators),
                &CsvPriceSource::new(prices),
                DateRange::new(start, end),
            )?;
            finish_run(&result, &output_dir)
        }
        Commands::Demo {
            config,
            seed,
            start,
            end,
            output_dir,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(cli.log_level.as_deref(), cli.log_json, &config.logging);
            let source = SyntheticSource::new(seed);
            let result = Pipeline::new(config)?.run(&source, &source, DateRange::new(start, end))?;
            finish_run(&result, &output_dir)
        }
        Commands::Signals {
            config,
            indicators,
            start,
            end,
            output_dir,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(cli.log_level.as_deref(), cli.log_json, &config.logging);
            let run = Pipeline::new(config)?
                .signals(&CsvIndicatorSource::new(indicators), DateRange::new(start, end))?;
            let rows = run.monthly_rows();
            print_signals(&rows);
            for d in &run.diagnostics {
                println!("NOTE: {d}");
            }
            let path = save_signals(&rows, &output_dir)?;
            println!("Signals saved to: {}", path.display());
            Ok(())
        }
        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            PipelineConfig::default()
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Default configuration written to: {}", path.display());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// `RUST_LOG` first, then `--log-level`, then the config file's level.
fn init_logging(level: Option<&str>, json: bool, config: &LoggingSection) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(level.unwrap_or(config.level.as_str())).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json || config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn finish_run(result: &PipelineResult, output_dir: &Path) -> Result<()> {
    print_summary(result);
    let paths = save_artifacts(result, output_dir)?;
    println!("Artifacts saved to: {}", paths.dir.display());
    Ok(())
}

fn fmt_opt(v: Option<f64>, scale: f64, suffix: &str) -> String {
    v.map_or_else(|| "n/a".into(), |x| format!("{:.3}{suffix}", x * scale))
}

fn print_summary(result: &PipelineResult) {
    let m = &result.metrics;
    println!();
    println!("=== Regime Backtest ===");
    println!("Assets:         {} / {}", result.risky, result.defensive);
    if let (Some(first), Some(last)) = (result.daily.first(), result.daily.last()) {
        println!("Period:         {} to {}", first.date, last.date);
    }
    println!("Smoother:       {}", result.smoother);
    let s = &result.regime_summary;
    println!(
        "Regimes:        {} risk-on / {} neutral / {} risk-off",
        s.risk_on, s.neutral, s.risk_off
    );
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {}", fmt_opt(m.cagr, 100.0, "%"));
    println!("Volatility:     {}", fmt_opt(m.annualized_volatility, 100.0, "%"));
    println!("Sharpe:         {}", fmt_opt(m.sharpe, 1.0, ""));
    println!("Sortino:        {}", fmt_opt(m.sortino, 1.0, ""));
    println!("Calmar:         {}", fmt_opt(m.calmar, 1.0, ""));
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Rebalances:     {}", m.rebalance_count);
    println!("Costs Paid:     {:.2}", m.total_transaction_cost);
    for benchmark in Benchmark::ALL {
        if let Some(alpha) = result.alpha_vs(benchmark) {
            println!("Alpha vs {:<15} {:+.2}%", format!("{}:", benchmark.label()), alpha * 100.0);
        }
    }

    let v = &result.validation;
    println!();
    println!("--- Validation ---");
    match &v.walk_forward {
        TestOutcome::Computed(wf) => println!(
            "Walk-forward:   split {}, Sharpe gap {}",
            wf.split_date,
            fmt_opt(wf.sharpe_gap, 1.0, "")
        ),
        TestOutcome::NotApplicable { reason } => println!("Walk-forward:   n/a ({reason})"),
    }
    match &v.newey_west {
        TestOutcome::Computed(t) => {
            println!("Newey-West:     t = {:.3}, p = {:.4}", t.t_statistic, t.p_value)
        }
        TestOutcome::NotApplicable { reason } => println!("Newey-West:     n/a ({reason})"),
    }
    match &v.drawdown_bootstrap {
        TestOutcome::Computed(b) => println!(
            "Drawdown diff:  {:+.2}%, p = {:.4}",
            b.observed_difference * 100.0,
            b.p_value
        ),
        TestOutcome::NotApplicable { reason } => println!("Drawdown diff:  n/a ({reason})"),
    }
    match &v.regime_welch {
        TestOutcome::Computed(w) => {
            println!("Welch on/off:   t = {:.3}, p = {:.4}", w.t_statistic, w.p_value)
        }
        TestOutcome::NotApplicable { reason } => println!("Welch on/off:   n/a ({reason})"),
    }

    if result.data_source == regimelab_core::data::DataSource::Synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    for d in &result.diagnostics {
        println!("NOTE: {d}");
    }
}

fn print_signals(rows: &[MonthlyRow]) {
    println!(
        "{:<12} {:>10} {:>10} {:<9} {:<9} {:>7}",
        "Date", "Raw", "Smoothed", "Regime", "Strength", "Risky"
    );
    println!("{}", "-".repeat(62));
    for row in rows {
        println!(
            "{:<12} {:>10.4} {:>10} {:<9} {:<9} {:>7}",
            row.date.to_string(),
            row.composite_raw,
            row.composite_smoothed.map_or_else(|| "-".into(), |v| format!("{v:.4}")),
            row.regime.map_or("-", |r| r.label()),
            row.strength.map_or("-", |s| s.label()),
            row.risky_weight.map_or_else(|| "-".into(), |w| format!("{w:.2}")),
        );
    }
}
