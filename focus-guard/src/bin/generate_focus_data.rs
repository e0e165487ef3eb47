//! Generate a synthesized FOCUS dataset as CSV.
//!
//! ```text
//! generate-focus-data [--rows N] [--seed N] [--version 1.0|1.1|1.2] [--output PATH]
//! ```
//!
//! The CSV goes to stdout unless `--output` is given; logs go to stderr.
//! The generated rows are validated against the same catalog before they
//! are written, and the run fails if any rule does not pass.

use clap::Parser;
use focus_guard::catalog::{CatalogRegistry, FocusVersion};
use focus_guard::core::{RuleEvaluator, RunnerConfig, ValidationRunner};
use focus_guard::error::ErrorContext;
use focus_guard::logging::setup::{init_logging, LoggingConfig};
use focus_guard::synth::DataSynthesizer;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// Number of rows to generate
    #[arg(long, default_value_t = 10_000)]
    rows: usize,

    /// Seed for the row generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// FOCUS version of the catalog to satisfy
    #[arg(long, default_value_t = FocusVersion::DEFAULT.to_string())]
    version: String,

    /// Write the CSV here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(LoggingConfig::default().with_stderr(true))?;

    let catalog = CatalogRegistry::global().resolve(&args.version)?;
    info!(
        rows = args.rows,
        seed = args.seed,
        version = %catalog.version(),
        "Generating FOCUS usage rows"
    );

    let (dataset, conflicts) = DataSynthesizer::default().generate(&catalog, args.rows, args.seed)?;
    for conflict in &conflicts.conflicts {
        info!(
            column = %conflict.column,
            winner = %conflict.winner,
            loser = %conflict.loser,
            rows = conflict.rows,
            "Rule superseded during generation"
        );
    }

    let dataset = Arc::new(dataset);
    let evaluator = Arc::new(RuleEvaluator::new(Arc::clone(&catalog))?);
    let report = ValidationRunner::new(evaluator, RunnerConfig::default())
        .run(Arc::clone(&dataset))
        .await?;
    if !report.valid() {
        for failed in report.failed() {
            warn!(rule.id = %failed.rule_id, violations = failed.violation_count, "Rule failed");
        }
        return Err(report.summary().into());
    }
    info!(summary = %report.summary(), "Generated data validates");

    let csv = dataset.to_csv()?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &csv)
                .with_context(|| format!("Writing dataset to {}", path.display()))?;
            info!(path = %path.display(), columns = dataset.columns().len(), "Wrote dataset");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&csv)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["generate-focus-data"]).unwrap();
        assert_eq!(args.rows, 10_000);
        assert_eq!(args.seed, 42);
        assert_eq!(args.version, FocusVersion::DEFAULT.to_string());
        assert!(args.output.is_none());
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "generate-focus-data",
            "--rows",
            "25",
            "--seed",
            "7",
            "--version",
            "1.0",
            "--output",
            "out.csv",
        ])
        .unwrap();
        assert_eq!(args.rows, 25);
        assert_eq!(args.seed, 7);
        assert_eq!(args.version, "1.0");
        assert_eq!(args.output, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn test_bad_row_count_is_rejected() {
        assert!(Args::try_parse_from(["generate-focus-data", "--rows", "many"]).is_err());
        assert!(Args::try_parse_from(["generate-focus-data", "--colour"]).is_err());
    }
}
