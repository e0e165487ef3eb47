//! Rule evaluation over dataset rows.
//!
//! [`RuleEvaluator`] produces one [`RuleOutcome`] per (rule, row) pair.
//! Within a row the non-composite rules run first; composites run afterwards
//! in member order so that every member verdict exists before the composite
//! reads it. Member evaluation for a composite reuses the member's verdict
//! for that row and never adds to the member's own tallies.

use super::aggregator::PartialAggregate;
use super::conflict::ConflictIndex;
use super::result::ValidationReport;
use crate::catalog::{CompositeMode, Rule, RuleCatalog, RuleKind};
use crate::dataset::{render_value, Dataset, Row};
use crate::logging::LogConfig;
use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Verdict of one rule on one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    /// The rule did not apply to the row
    Skip,
    /// A lenient rule failed where a higher-priority rule wins
    Conflict,
}

impl Verdict {
    /// Pass and Conflict both count as passing.
    pub fn passed(self) -> bool {
        matches!(self, Verdict::Pass | Verdict::Conflict)
    }

    pub fn is_skip(self) -> bool {
        self == Verdict::Skip
    }
}

/// Result of one rule on one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub row_index: usize,
    pub verdict: Verdict,
    pub detail: Option<String>,
    /// Value of the rule's target column when the rule did not pass outright
    pub observed: Option<String>,
}

impl RuleOutcome {
    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }
}

/// Evaluator settings.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Reject datasets that lack a column the catalog marks as required
    pub check_required_columns: bool,
    pub log: LogConfig,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            check_required_columns: true,
            log: LogConfig::default(),
        }
    }
}

impl EvaluatorConfig {
    pub fn with_required_columns(mut self, check: bool) -> Self {
        self.check_required_columns = check;
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

/// Evaluates a catalog's rules against rows.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    catalog: Arc<RuleCatalog>,
    conflicts: ConflictIndex,
    config: EvaluatorConfig,
}

impl RuleEvaluator {
    /// Creates an evaluator with the default configuration.
    ///
    /// Fails with [`FocusError::ConflictingRules`] when a lenient rule
    /// contradicts another rule of the same priority.
    pub fn new(catalog: Arc<RuleCatalog>) -> Result<Self> {
        Self::with_config(catalog, EvaluatorConfig::default())
    }

    pub fn with_config(catalog: Arc<RuleCatalog>, config: EvaluatorConfig) -> Result<Self> {
        let conflicts = ConflictIndex::build(&catalog)?;
        Ok(Self {
            catalog,
            conflicts,
            config,
        })
    }

    pub fn catalog(&self) -> &Arc<RuleCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Checks that the dataset carries every column the catalog requires.
    pub fn check_schema(&self, dataset: &Dataset) -> Result<()> {
        self.check_columns(dataset.columns())
    }

    pub(crate) fn check_columns(&self, columns: &[String]) -> Result<()> {
        if !self.config.check_required_columns {
            return Ok(());
        }
        for required in self.catalog.required_columns() {
            if !columns.contains(required) {
                return Err(FocusError::schema_column(
                    required.clone(),
                    format!(
                        "dataset is missing column '{required}' required by FOCUS {}",
                        self.catalog.version()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Evaluates every rule on every row.
    ///
    /// Outcomes come back in catalog order, then row order.
    #[instrument(skip(self, dataset), fields(
        catalog.version = %self.catalog.version(),
        dataset.rows = dataset.len(),
        rules = self.catalog.len()
    ))]
    pub fn evaluate(&self, dataset: &Dataset) -> Result<Vec<RuleOutcome>> {
        self.check_schema(dataset)?;

        let rule_count = self.catalog.len();
        let mut by_rule: Vec<Vec<RuleOutcome>> = (0..rule_count)
            .map(|_| Vec::with_capacity(dataset.len()))
            .collect();

        for (row_index, row) in dataset.rows().iter().enumerate() {
            for (rule_index, outcome) in self.evaluate_row(row_index, row).into_iter().enumerate() {
                by_rule[rule_index].push(outcome);
            }
        }

        let outcomes: Vec<RuleOutcome> = by_rule.into_iter().flatten().collect();
        debug!(outcomes = outcomes.len(), "Evaluation finished");
        Ok(outcomes)
    }

    /// Evaluates and reduces a dataset in one pass.
    ///
    /// Unlike [`ResultAggregator::reduce`](super::ResultAggregator::reduce),
    /// every row counts towards `total_rows`, even when no rule applies.
    #[instrument(skip(self, dataset), fields(
        catalog.version = %self.catalog.version(),
        dataset.rows = dataset.len()
    ))]
    pub fn validate(&self, dataset: &Dataset) -> Result<ValidationReport> {
        self.check_schema(dataset)?;

        let mut partial = PartialAggregate::for_catalog(&self.catalog);
        for (row_index, row) in dataset.rows().iter().enumerate() {
            let outcomes = self.evaluate_row(row_index, row);
            partial.record_row(row_index, &outcomes);
        }
        Ok(partial.finish(&self.catalog, true))
    }

    /// Evaluates every rule on a single row, in catalog order.
    pub fn evaluate_row(&self, row_index: usize, row: &Row) -> Vec<RuleOutcome> {
        let rules = self.catalog.rules();
        let mut verdicts: Vec<(Verdict, Option<String>)> = Vec::with_capacity(rules.len());

        for (rule_index, rule) in rules.iter().enumerate() {
            let (verdict, detail) = if rule.is_composite() {
                (Verdict::Skip, None)
            } else {
                self.evaluate_simple(rule_index, rule, row)
            };
            verdicts.push((verdict, detail));
        }

        for &composite in self.catalog.composite_order() {
            let rule = &rules[composite];
            if let RuleKind::Composite { mode, members } = &rule.kind {
                verdicts[composite] = self.combine(*mode, members, &verdicts);
            }
        }

        rules
            .iter()
            .zip(verdicts)
            .map(|(rule, (verdict, detail))| {
                let observed = match verdict {
                    Verdict::Fail | Verdict::Conflict => rule
                        .target_column()
                        .filter(|_| !rule.is_composite())
                        .map(|column| render_value(row.get(column))),
                    _ => None,
                };
                crate::log_rule!(
                    self.config.log,
                    rule.id = %rule.id,
                    row = row_index,
                    verdict = ?verdict,
                    "Rule evaluated"
                );
                RuleOutcome {
                    rule_id: rule.id.clone(),
                    row_index,
                    verdict,
                    detail,
                    observed,
                }
            })
            .collect()
    }

    fn evaluate_simple(
        &self,
        rule_index: usize,
        rule: &Rule,
        row: &Row,
    ) -> (Verdict, Option<String>) {
        let patterns = self.catalog.patterns();
        let result = match &rule.kind {
            RuleKind::Required => Ok(rule.column.as_deref().is_some_and(|c| !row.is_null(c))),
            RuleKind::Forbidden => Ok(rule.column.as_deref().map_or(true, |c| row.is_null(c))),
            RuleKind::Check { predicate } => predicate.evaluate(row, patterns),
            RuleKind::Conditional { when, then } => match when.evaluate(row, patterns) {
                Ok(true) => then.evaluate(row, patterns),
                Ok(false) => return (Verdict::Skip, None),
                Err(mismatch) => Err(mismatch),
            },
            RuleKind::Composite { .. } => return (Verdict::Skip, None),
        };

        match result {
            Ok(true) => (Verdict::Pass, None),
            Ok(false) => {
                if rule.is_lenient() {
                    if let Some(winner) =
                        self.conflicts
                            .superseding_rule(rule_index, row, &self.catalog)
                    {
                        let winner_id = &self.catalog.rules()[winner].id;
                        return (
                            Verdict::Conflict,
                            Some(format!("conflict: superseded by {winner_id}")),
                        );
                    }
                }
                (Verdict::Fail, None)
            }
            Err(mismatch) => {
                debug!(
                    rule.id = %rule.id,
                    column = %mismatch.column,
                    expected = mismatch.expected,
                    found = %self.config.log.field(&mismatch.found),
                    "Predicate could not be applied"
                );
                (Verdict::Fail, Some(mismatch.to_string()))
            }
        }
    }

    fn combine(
        &self,
        mode: CompositeMode,
        members: &[String],
        verdicts: &[(Verdict, Option<String>)],
    ) -> (Verdict, Option<String>) {
        let member_verdicts: Vec<Verdict> = members
            .iter()
            .filter_map(|id| self.catalog.rule_index(id))
            .map(|i| verdicts[i].0)
            .collect();

        if member_verdicts.iter().all(|v| v.is_skip()) {
            return (Verdict::Skip, None);
        }

        let passed = match mode {
            CompositeMode::Or => member_verdicts.iter().any(|v| v.passed()),
            CompositeMode::And => !member_verdicts
                .iter()
                .any(|v| !v.is_skip() && !v.passed()),
        };

        if passed {
            (Verdict::Pass, None)
        } else {
            let detail = match mode {
                CompositeMode::Or => format!("no member passed: {}", members.join(", ")),
                CompositeMode::And => {
                    let failed: Vec<&str> = members
                        .iter()
                        .filter(|id| {
                            self.catalog
                                .rule_index(id)
                                .is_some_and(|i| verdicts[i].0 == Verdict::Fail)
                        })
                        .map(String::as_str)
                        .collect();
                    format!("members failed: {}", failed.join(", "))
                }
            };
            (Verdict::Fail, Some(detail))
        }
    }
}
