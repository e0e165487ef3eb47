//! # focus-guard
//!
//! Validation of FOCUS cost-and-usage datasets against versioned rule
//! catalogs, and synthesis of datasets that satisfy those catalogs.
//!
//! ## Quick Start
//!
//! ```rust
//! use focus_guard::prelude::*;
//! use focus_guard::core::{ResponseOptions, ResultAggregator};
//! use std::sync::Arc;
//!
//! # fn main() -> focus_guard::prelude::Result<()> {
//! // Built-in catalogs are loaded once per version and shared.
//! let catalog = CatalogRegistry::global().resolve("1.2")?;
//!
//! // Synthesize a compliant dataset ...
//! let (dataset, _conflicts) = DataSynthesizer::default().generate(&catalog, 100, 42)?;
//!
//! // ... and validate it.
//! let evaluator = RuleEvaluator::new(Arc::clone(&catalog))?;
//! let outcomes = evaluator.evaluate(&dataset)?;
//! let report = ResultAggregator::reduce(&outcomes, &catalog);
//!
//! assert!(report.valid());
//! let response = report.to_response(&ResponseOptions::default());
//! assert_eq!(response.summary, format!(
//!     "All {} validation rules passed for 100 rows.",
//!     report.rules_passed
//! ));
//! # Ok(())
//! # }
//! ```
//!
//! ## Rules
//!
//! A catalog is plain JSON. Each rule is one of:
//!
//! - **Required** / **Forbidden**: the rule's column must (not) hold a value
//! - **Check**: an unconditional predicate such as an allowed-value list,
//!   a regex or a numeric range
//! - **Conditional**: `then` must hold on rows where `when` holds; other
//!   rows are skipped and never count as violations
//! - **Composite**: an `and`/`or` combination of other rules by id
//!
//! Rules carry a `strictness` and a `priority`. When a lenient rule
//! contradicts a higher-priority rule on the same column, its failures on
//! rows where the winner applies are reported as superseded instead of
//! failed. This keeps known errata in published rule sets from failing
//! compliant data.
//!
//! ## Architecture
//!
//! - **`catalog`**: rule model, JSON loading, validation and the per-version
//!   registry
//! - **`dataset`**: rows of optional scalars, Arrow and CSV interchange
//! - **`core`**: evaluator, aggregator, parallel and streaming runners, and
//!   the report types
//! - **`synth`**: constraint-driven dataset synthesis
//! - **`formatters`**: JSON, console and Markdown report rendering
//! - **`logging`**: `tracing` configuration helpers

pub mod catalog;
pub mod core;
pub mod dataset;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod synth;
