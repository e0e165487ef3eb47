//! Parallel and streaming execution of a [`RuleEvaluator`].
//!
//! [`ValidationRunner`] splits a materialized dataset into contiguous row
//! partitions, evaluates each partition on a blocking tokio task and merges
//! the resulting [`PartialAggregate`]s in the coordinating task. No state is
//! shared between workers apart from the read-only evaluator, the dataset
//! and the cancellation flag.
//!
//! [`StreamingValidator`] covers forward-only cursors: rows are pushed one at
//! a time and never revisited.
//!
//! Both honour a [`Budget`] and a [`CancellationFlag`]. Work stops after the
//! current row and the report is marked incomplete; its counts cover exactly
//! the rows that were processed.
//!
//! ```rust,no_run
//! use focus_guard::prelude::*;
//! use focus_guard::catalog::CatalogRegistry;
//! use focus_guard::core::{RuleEvaluator, RunnerConfig, ValidationRunner};
//! use focus_guard::dataset::Dataset;
//! use std::sync::Arc;
//!
//! # async fn example(dataset: Dataset) -> Result<()> {
//! let catalog = CatalogRegistry::global().resolve("1.2")?;
//! let evaluator = Arc::new(RuleEvaluator::new(catalog)?);
//! let runner = ValidationRunner::new(evaluator, RunnerConfig::default().with_workers(4));
//!
//! let report = runner.run(Arc::new(dataset)).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use super::aggregator::PartialAggregate;
use super::evaluator::RuleEvaluator;
use super::result::ValidationReport;
use crate::dataset::{Dataset, Row};
use crate::prelude::*;
use futures::future::try_join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Limits on how much work a run may do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    /// Only the first `max_rows` rows are evaluated
    pub max_rows: Option<usize>,
    /// Workers stop once this much time has passed since the run started
    pub max_duration: Option<Duration>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn rows(max_rows: usize) -> Self {
        Self::default().with_max_rows(max_rows)
    }

    pub fn duration(max_duration: Duration) -> Self {
        Self::default().with_max_duration(max_duration)
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    fn time_left(&self, started: Instant) -> bool {
        self.max_duration
            .map_or(true, |limit| started.elapsed() < limit)
    }
}

/// Cooperative cancellation shared between a caller and a run.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every worker to stop after its current row.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Runner settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Number of row partitions evaluated concurrently
    pub workers: usize,
    pub budget: Budget,
    pub cancellation: CancellationFlag,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            budget: Budget::default(),
            cancellation: CancellationFlag::default(),
        }
    }
}

impl RunnerConfig {
    /// Single worker, no budget.
    pub fn sequential() -> Self {
        Self::default().with_workers(1)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Runs an evaluator over a dataset on worker tasks.
#[derive(Debug, Clone)]
pub struct ValidationRunner {
    evaluator: Arc<RuleEvaluator>,
    config: RunnerConfig,
}

impl ValidationRunner {
    pub fn new(evaluator: Arc<RuleEvaluator>, config: RunnerConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Handle for cancelling runs started by this runner.
    pub fn cancellation(&self) -> CancellationFlag {
        self.config.cancellation.clone()
    }

    /// Splits `rows` into at most `workers` contiguous ranges.
    fn partitions(rows: usize, workers: usize) -> Vec<(usize, usize)> {
        if rows == 0 {
            return Vec::new();
        }
        let workers = workers.clamp(1, rows);
        let base = rows / workers;
        let extra = rows % workers;
        let mut start = 0;
        (0..workers)
            .map(|i| {
                let len = base + usize::from(i < extra);
                let range = (start, start + len);
                start += len;
                range
            })
            .collect()
    }

    /// Validates the dataset and reduces it into a report.
    #[instrument(skip(self, dataset), fields(
        dataset.rows = dataset.len(),
        workers = self.config.workers,
        catalog.version = %self.evaluator.catalog().version()
    ))]
    pub async fn run(&self, dataset: Arc<Dataset>) -> Result<ValidationReport> {
        self.evaluator.check_schema(&dataset)?;

        let started = Instant::now();
        let target = self
            .config
            .budget
            .max_rows
            .map_or(dataset.len(), |max| max.min(dataset.len()));

        let mut handles = Vec::new();
        for (start, end) in Self::partitions(target, self.config.workers) {
            let evaluator = Arc::clone(&self.evaluator);
            let dataset = Arc::clone(&dataset);
            let budget = self.config.budget;
            let cancellation = self.config.cancellation.clone();

            handles.push(tokio::task::spawn_blocking(move || {
                evaluate_partition(&evaluator, &dataset, start, end, budget, &cancellation, started)
            }));
        }

        let partials = try_join_all(handles)
            .await
            .map_err(|e| FocusError::Internal(format!("Task join error: {e}")))?;

        let merged = if partials.is_empty() {
            PartialAggregate::for_catalog(self.evaluator.catalog())
        } else {
            PartialAggregate::merge(partials)?
        };
        let complete = merged.total_rows() == dataset.len();
        if !complete {
            warn!(
                processed = merged.total_rows(),
                total = dataset.len(),
                "Validation stopped before the end of the dataset"
            );
        }

        let report = merged.finish(self.evaluator.catalog(), complete);
        info!(
            rows = report.total_rows,
            rules.passed = report.rules_passed,
            rules.failed = report.rules_failed,
            rules.skipped = report.rules_skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Validation finished"
        );
        Ok(report)
    }
}

fn evaluate_partition(
    evaluator: &RuleEvaluator,
    dataset: &Dataset,
    start: usize,
    end: usize,
    budget: Budget,
    cancellation: &CancellationFlag,
    started: Instant,
) -> PartialAggregate {
    let partition_started = Instant::now();
    let mut partial = PartialAggregate::for_catalog(evaluator.catalog());
    for row_index in start..end {
        if cancellation.is_cancelled() || !budget.time_left(started) {
            debug!(start, end, stopped_at = row_index, "Partition stopped early");
            break;
        }
        let outcomes = evaluator.evaluate_row(row_index, &dataset.rows()[row_index]);
        partial.record_row(row_index, &outcomes);
    }
    crate::perf_debug!(
        evaluator.config().log,
        start,
        end,
        elapsed_us = partition_started.elapsed().as_micros() as u64,
        "Partition evaluated"
    );
    partial
}

/// Single-pass validation over a forward-only sequence of rows.
#[derive(Debug)]
pub struct StreamingValidator {
    evaluator: Arc<RuleEvaluator>,
    columns: Vec<String>,
    partial: PartialAggregate,
    next_row: usize,
    budget: Budget,
    cancellation: CancellationFlag,
    started: Instant,
    stopped: bool,
}

impl StreamingValidator {
    /// Starts a stream whose rows carry `columns`.
    pub fn new(evaluator: Arc<RuleEvaluator>, columns: Vec<String>) -> Result<Self> {
        evaluator.check_columns(&columns)?;
        let partial = PartialAggregate::for_catalog(evaluator.catalog());
        Ok(Self {
            evaluator,
            columns,
            partial,
            next_row: 0,
            budget: Budget::default(),
            cancellation: CancellationFlag::default(),
            started: Instant::now(),
            stopped: false,
        })
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Rows processed so far.
    pub fn rows_processed(&self) -> usize {
        self.next_row
    }

    fn exhausted(&self) -> bool {
        self.cancellation.is_cancelled()
            || self.budget.max_rows.is_some_and(|max| self.next_row >= max)
            || !self.budget.time_left(self.started)
    }

    /// Evaluates the next row.
    ///
    /// Returns `Ok(false)` once the budget is spent or the run was
    /// cancelled; the row is then not evaluated and the report will be
    /// marked incomplete.
    pub fn push_row(&mut self, row: &Row) -> Result<bool> {
        if self.stopped || self.exhausted() {
            self.stopped = true;
            return Ok(false);
        }
        if let Some(unknown) = row.keys().find(|k| !self.columns.iter().any(|c| c == k)) {
            return Err(FocusError::schema_column(
                unknown,
                format!("row key '{unknown}' is not a stream column"),
            ));
        }
        let outcomes = self.evaluator.evaluate_row(self.next_row, row);
        self.partial.record_row(self.next_row, &outcomes);
        self.next_row += 1;
        Ok(true)
    }

    /// Pushes rows until the iterator ends or the budget runs out.
    pub fn consume<I>(mut self, rows: I) -> Result<ValidationReport>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut rows = rows.into_iter();
        for row in rows.by_ref() {
            if !self.push_row(&row)? {
                break;
            }
        }
        // Anything left in the cursor means the run did not cover it.
        if rows.next().is_some() {
            self.stopped = true;
        }
        Ok(self.finish())
    }

    /// Closes the stream and builds the report.
    pub fn finish(self) -> ValidationReport {
        let report = self
            .partial
            .finish(self.evaluator.catalog(), !self.stopped);
        info!(
            rows = report.total_rows,
            complete = report.complete,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Streaming validation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions_cover_rows() {
        assert!(ValidationRunner::partitions(0, 4).is_empty());
        assert_eq!(ValidationRunner::partitions(3, 8), vec![(0, 1), (1, 2), (2, 3)]);
        assert_eq!(
            ValidationRunner::partitions(10, 3),
            vec![(0, 4), (4, 7), (7, 10)]
        );
    }

    #[test]
    fn test_budget_builders() {
        let budget = Budget::rows(10).with_max_duration(Duration::from_secs(1));
        assert_eq!(budget.max_rows, Some(10));
        assert_eq!(budget.max_duration, Some(Duration::from_secs(1)));
        assert!(Budget::unlimited().time_left(Instant::now()));
        assert!(!Budget::duration(Duration::ZERO).time_left(Instant::now()));
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_worker_count_is_at_least_one() {
        assert_eq!(RunnerConfig::default().with_workers(0).workers, 1);
        assert_eq!(RunnerConfig::sequential().workers, 1);
    }

    #[test]
    fn test_partition_with_debug_logging() {
        use crate::catalog::Rule;
        use crate::core::EvaluatorConfig;
        use crate::logging::LogConfig;

        let catalog = RuleCatalog::builder("1.2")
            .columns(["BilledCost"])
            .rule(Rule::required("BilledCost-C-001-M", "BilledCost present", "BilledCost"))
            .build()
            .unwrap();
        let evaluator = RuleEvaluator::with_config(
            Arc::new(catalog),
            EvaluatorConfig::default().with_log_config(LogConfig::verbose()),
        )
        .unwrap();
        let dataset = Dataset::from_string_rows(
            vec!["BilledCost".to_string()],
            vec![vec!["1".to_string()], vec![String::new()], vec!["3".to_string()]],
        )
        .unwrap();

        let partial = evaluate_partition(
            &evaluator,
            &dataset,
            1,
            3,
            Budget::unlimited(),
            &CancellationFlag::new(),
            Instant::now(),
        );
        let report = partial.finish(evaluator.catalog(), true);
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.result("BilledCost-C-001-M").unwrap().violation_count, 1);
    }
}
