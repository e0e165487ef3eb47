//! Parallel, budgeted and streaming validation runs.

use focus_guard::catalog::{CatalogRegistry, FocusVersion, RuleCatalog};
use focus_guard::core::{
    Budget, CancellationFlag, ResultAggregator, RuleEvaluator, RunnerConfig, StreamingValidator,
    ValidationRunner,
};
use focus_guard::dataset::{Dataset, Row};
use focus_guard::error::FocusError;
use focus_guard::synth::DataSynthesizer;
use std::sync::Arc;

fn synthesized(rows: usize) -> (Arc<RuleCatalog>, Arc<Dataset>) {
    let catalog = CatalogRegistry::global().get(FocusVersion::V1_2).unwrap();
    let (mut dataset, _) = DataSynthesizer::default()
        .generate(&catalog, rows, 11)
        .unwrap();

    // Break a couple of rows so the reports carry failures and samples.
    let mut broken = dataset.rows()[3].clone();
    broken.set("BillingCurrency", Some("usd".into()));
    dataset.push_row(broken).unwrap();
    let mut broken = dataset.rows()[7].clone();
    broken.set("ProviderName", None);
    dataset.push_row(broken).unwrap();

    (catalog, Arc::new(dataset))
}

#[tokio::test]
async fn test_parallel_run_matches_single_pass() {
    let (catalog, dataset) = synthesized(250);
    let evaluator = Arc::new(RuleEvaluator::new(Arc::clone(&catalog)).unwrap());

    let expected = ResultAggregator::reduce(&evaluator.evaluate(&dataset).unwrap(), &catalog);
    assert_eq!(expected.rules_failed, 2);

    for workers in [1, 3, 8] {
        let runner = ValidationRunner::new(
            Arc::clone(&evaluator),
            RunnerConfig::default().with_workers(workers),
        );
        let report = runner.run(Arc::clone(&dataset)).await.unwrap();
        assert_eq!(report, expected, "workers = {workers}");
    }
}

#[tokio::test]
async fn test_row_budget_stops_early() {
    let (catalog, dataset) = synthesized(50);
    let evaluator = Arc::new(RuleEvaluator::new(catalog).unwrap());
    let runner = ValidationRunner::new(
        evaluator,
        RunnerConfig::default()
            .with_workers(2)
            .with_budget(Budget::rows(5)),
    );

    let report = runner.run(dataset).await.unwrap();
    assert!(!report.complete);
    assert_eq!(report.total_rows, 5);
    assert!(report.summary().ends_with("Validation stopped early after 5 rows."));
}

#[tokio::test]
async fn test_cancelled_run_processes_nothing() {
    let (catalog, dataset) = synthesized(20);
    let evaluator = Arc::new(RuleEvaluator::new(catalog).unwrap());
    let flag = CancellationFlag::new();
    flag.cancel();

    let runner = ValidationRunner::new(
        evaluator,
        RunnerConfig::default().with_cancellation(flag),
    );
    let report = runner.run(dataset).await.unwrap();
    assert!(!report.complete);
    assert_eq!(report.total_rows, 0);
    assert_eq!(report.rules_failed, 0);
}

#[tokio::test]
async fn test_runner_rejects_missing_required_column() {
    let catalog = CatalogRegistry::global().get(FocusVersion::V1_2).unwrap();
    let evaluator = Arc::new(RuleEvaluator::new(catalog).unwrap());
    let runner = ValidationRunner::new(evaluator, RunnerConfig::sequential());

    let dataset = Dataset::new(["SkuId"]).unwrap();
    let error = runner.run(Arc::new(dataset)).await.unwrap_err();
    assert!(matches!(error, FocusError::Schema { .. }));
}

#[test]
fn test_streaming_matches_materialized() {
    let (catalog, dataset) = synthesized(40);
    let evaluator = Arc::new(RuleEvaluator::new(Arc::clone(&catalog)).unwrap());
    let expected = ResultAggregator::reduce(&evaluator.evaluate(&dataset).unwrap(), &catalog);

    let stream = StreamingValidator::new(evaluator, dataset.columns().to_vec()).unwrap();
    let report = stream.consume(dataset.rows().iter().cloned()).unwrap();
    assert_eq!(report, expected);
}

#[test]
fn test_streaming_budget_marks_report_incomplete() {
    let (catalog, dataset) = synthesized(40);
    let evaluator = Arc::new(RuleEvaluator::new(catalog).unwrap());

    let mut stream = StreamingValidator::new(evaluator, dataset.columns().to_vec())
        .unwrap()
        .with_budget(Budget::rows(10));
    let mut accepted = 0;
    for row in dataset.rows() {
        if !stream.push_row(row).unwrap() {
            break;
        }
        accepted += 1;
    }
    assert_eq!(accepted, 10);
    assert_eq!(stream.rows_processed(), 10);

    let report = stream.finish();
    assert!(!report.complete);
    assert_eq!(report.total_rows, 10);
}

#[test]
fn test_streaming_rejects_unknown_keys() {
    let (catalog, dataset) = synthesized(10);
    let evaluator = Arc::new(RuleEvaluator::new(catalog).unwrap());
    let mut stream = StreamingValidator::new(evaluator, dataset.columns().to_vec()).unwrap();

    let row = Row::new().with("NotAFocusColumn", "x");
    assert!(stream.push_row(&row).is_err());
    assert_eq!(stream.rows_processed(), 0);
}
