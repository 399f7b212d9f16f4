//! PAL Validator CLI: robustness validation for price-action patterns.
//!
//! Commands:
//! - `validate`: run a robustness batch from a TOML config against a synthetic series
//! - `tolerances`: print the tolerance lookup curves

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use palvalidator_core::PatternBackTester;
use palvalidator_runner::robustness::tolerance::{
    tolerance_for_iterations, tolerance_for_num_trades, tolerance_for_percent_difference, MAX_TABLE_INDEX,
};
use palvalidator_runner::{RobustnessSummary, RobustnessTester, ValidatorConfig};

#[derive(Parser)]
#[command(
    name = "palvalidator",
    about = "PAL Validator: permutation robustness testing for price-action patterns"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every pattern in a TOML config.
    Validate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Also write the JSON report to this path.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the JSON report to stdout.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the tolerance curves.
    Tolerances {
        /// Last index to print.
        #[arg(long, default_value_t = 20)]
        max: u64,
    },
}

#[derive(Serialize)]
struct StrategyReport {
    name: String,
    pattern_hash: u64,
    summary: RobustnessSummary,
}

#[derive(Serialize)]
struct ErroredReport {
    name: String,
    pattern_hash: u64,
    error: String,
}

#[derive(Serialize)]
struct BatchReport {
    config: ValidatorConfig,
    surviving: Vec<StrategyReport>,
    rejected: Vec<StrategyReport>,
    errored: Vec<ErroredReport>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { config, output, json } => run_validate(&config, output.as_deref(), json),
        Commands::Tolerances { max } => {
            print_tolerances(max);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_validate(config_path: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let config = ValidatorConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let series = config.random_walk().generate();
    info!(
        symbol = %series.symbol,
        bars = series.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        "synthetic series generated"
    );
    let prototype = PatternBackTester::new(Arc::new(series));

    let mut tester = config.tester()?;
    tester.run(&prototype)?;

    let report = build_report(config, &tester);

    if let Some(path) = output {
        let body = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn build_report(config: ValidatorConfig, tester: &RobustnessTester) -> BatchReport {
    let reports = |strategies: Vec<&palvalidator_core::domain::PalStrategy>| -> Vec<StrategyReport> {
        strategies
            .into_iter()
            .filter_map(|s| {
                let hash = s.pattern().hash_code();
                tester.calculator(hash).map(|calc| StrategyReport {
                    name: s.name().to_string(),
                    pattern_hash: hash,
                    summary: RobustnessSummary::from_calculator(calc),
                })
            })
            .collect()
    };

    BatchReport {
        config,
        surviving: reports(tester.surviving_strategies().collect()),
        rejected: reports(tester.rejected_strategies().collect()),
        errored: tester
            .errored_strategies()
            .map(|(s, e)| ErroredReport {
                name: s.name().to_string(),
                pattern_hash: s.pattern().hash_code(),
                error: e.to_string(),
            })
            .collect(),
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("=== Robustness Results ===");
    println!(
        "Surviving: {}  Rejected: {}  Errored: {}",
        report.surviving.len(),
        report.rejected.len(),
        report.errored.len()
    );
    println!();
    println!(
        "{:<28} {:>8} {:>10} {:>10} {:>8}  {}",
        "Strategy", "Stop", "Rob. idx", "Prof. idx", "Med PF", "Verdict"
    );
    for (label, entries) in [("robust", &report.surviving), ("rejected", &report.rejected)] {
        for entry in entries {
            let s = &entry.summary;
            let verdict = match &s.verdict {
                Some(palvalidator_runner::Verdict::Rejected(rejection)) => format!("{label}: {rejection:?}"),
                _ => label.to_string(),
            };
            println!(
                "{:<28} {:>8} {:>10} {:>10} {:>8}  {}",
                entry.name,
                s.original_stop,
                round2(s.robustness_index),
                round2(s.profitability_index),
                round2(s.profit_factor.median),
                verdict
            );
        }
    }
    for entry in &report.errored {
        println!("{:<28} error: {}", entry.name, entry.error);
    }
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp(2)
}

fn print_tolerances(max: u64) {
    println!("{:>6} {:>12} {:>12} {:>12}", "Index", "Distance %", "Steps %", "Trades %");
    for i in 0..=max.min(MAX_TABLE_INDEX as u64) {
        println!(
            "{:>6} {:>12} {:>12} {:>12}",
            i,
            tolerance_for_percent_difference(i).percent(),
            tolerance_for_iterations(i).percent(),
            tolerance_for_num_trades(i).percent()
        );
    }
}
