//! Rule evaluation and result aggregation.
//!
//! ## Overview
//!
//! - **[`RuleEvaluator`]**: applies a [`RuleCatalog`](crate::catalog::RuleCatalog)
//!   to every row and produces one [`RuleOutcome`] per rule and row
//! - **[`ResultAggregator`]** / **[`PartialAggregate`]**: reduce outcomes into a
//!   [`ValidationReport`]; partial states merge, so any contiguous split of the
//!   rows gives the same report as a single pass
//! - **[`ValidationRunner`]**: evaluates row partitions on worker tasks under a
//!   [`Budget`] and a [`CancellationFlag`]
//! - **[`StreamingValidator`]**: single-pass variant for forward-only cursors
//!
//! ## Flow
//!
//! ```text
//! Dataset ──▶ RuleEvaluator ──▶ RuleOutcome* ──▶ PartialAggregate ──merge──▶ ValidationReport
//!                  │                                                              │
//!            ConflictIndex                                              ValidationResponse
//! ```
//!
//! ## Example
//!
//! ```rust
//! use focus_guard::catalog::{Predicate, Rule, RuleCatalog};
//! use focus_guard::core::{ResultAggregator, RuleEvaluator};
//! use focus_guard::dataset::{Dataset, Row};
//! use std::sync::Arc;
//!
//! # fn main() -> focus_guard::prelude::Result<()> {
//! let catalog = RuleCatalog::builder("1.2")
//!     .columns(["BilledCost"])
//!     .rule(Rule::required("BilledCost-C-001-M", "BilledCost present", "BilledCost"))
//!     .build()?;
//!
//! let dataset = Dataset::new(["BilledCost"])?
//!     .with_row(Row::new().with("BilledCost", "1.5"))?
//!     .with_row(Row::new().with_null("BilledCost"))?;
//!
//! let evaluator = RuleEvaluator::new(Arc::new(catalog))?;
//! let outcomes = evaluator.evaluate(&dataset)?;
//! let report = ResultAggregator::reduce(&outcomes, evaluator.catalog());
//!
//! assert_eq!(report.rules_failed, 1);
//! assert_eq!(report.results[0].violation_count, 1);
//! # Ok(())
//! # }
//! ```

mod aggregator;
pub mod conflict;
mod evaluator;
pub mod predicate;
mod result;
mod runner;

pub use aggregator::{default_error_message, PartialAggregate, ResultAggregator, RuleTally};
pub use conflict::ConflictIndex;
pub use evaluator::{EvaluatorConfig, RuleEvaluator, RuleOutcome, Verdict};
pub use predicate::TypeMismatch;
pub use result::{
    CheckResult, CheckStatus, ResponseOptions, SkippedRule, SupersededRule, ValidationError,
    ValidationReport, ValidationResponse,
};
pub use runner::{Budget, CancellationFlag, RunnerConfig, StreamingValidator, ValidationRunner};
