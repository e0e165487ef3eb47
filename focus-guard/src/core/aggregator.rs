//! Reduction of rule outcomes into per-rule results.
//!
//! The reduction is built on [`PartialAggregate`], a mergeable state in the
//! same spirit as an analyzer state: partials computed on disjoint row
//! ranges merge into the same value the whole dataset would produce, in any
//! grouping and any order.

use super::evaluator::{RuleOutcome, Verdict};
use super::result::{CheckResult, CheckStatus, ValidationReport};
use crate::catalog::{CompositeMode, Rule, RuleCatalog, RuleKind};
use crate::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Maximum number of distinct offending values kept per rule.
pub const MAX_SAMPLES: usize = 5;

/// Running tallies for one rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleTally {
    /// Outcomes other than Skip
    pub evaluated: usize,
    pub failures: usize,
    pub conflicts: usize,
    /// `(row_index, value)` for the earliest occurrence of each distinct value
    samples: Vec<(usize, String)>,
    /// Detail of the earliest failing outcome that carried one
    first_detail: Option<(usize, String)>,
    /// Detail of the earliest superseded outcome
    #[serde(default)]
    first_conflict: Option<(usize, String)>,
}

impl RuleTally {
    fn record(&mut self, outcome: &RuleOutcome) {
        match outcome.verdict {
            Verdict::Skip => return,
            Verdict::Pass => {}
            Verdict::Conflict => {
                self.conflicts += 1;
                if let Some(detail) = &outcome.detail {
                    offer_earliest(&mut self.first_conflict, outcome.row_index, detail);
                }
            }
            Verdict::Fail => {
                self.failures += 1;
                if let Some(value) = &outcome.observed {
                    self.add_sample(outcome.row_index, value.clone());
                }
                if let Some(detail) = &outcome.detail {
                    offer_earliest(&mut self.first_detail, outcome.row_index, detail);
                }
            }
        }
        self.evaluated += 1;
    }

    fn add_sample(&mut self, row_index: usize, value: String) {
        if let Some(existing) = self.samples.iter_mut().find(|(_, v)| *v == value) {
            existing.0 = existing.0.min(row_index);
        } else {
            self.samples.push((row_index, value));
        }
        self.normalize_samples();
    }

    fn normalize_samples(&mut self) {
        self.samples.sort();
        let mut seen: Vec<&str> = Vec::with_capacity(self.samples.len());
        let mut keep = Vec::with_capacity(self.samples.len());
        for (row, value) in &self.samples {
            if !seen.contains(&value.as_str()) {
                seen.push(value);
                keep.push((*row, value.clone()));
            }
        }
        keep.truncate(MAX_SAMPLES);
        self.samples = keep;
    }

    fn absorb(&mut self, other: RuleTally) {
        self.evaluated += other.evaluated;
        self.failures += other.failures;
        self.conflicts += other.conflicts;
        self.samples.extend(other.samples);
        self.normalize_samples();
        if let Some((row, detail)) = other.first_detail {
            offer_earliest(&mut self.first_detail, row, &detail);
        }
        if let Some((row, detail)) = other.first_conflict {
            offer_earliest(&mut self.first_conflict, row, &detail);
        }
    }

    /// Sample values in row order.
    pub fn samples(&self) -> Vec<String> {
        self.samples.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn status(&self) -> CheckStatus {
        if self.evaluated == 0 {
            CheckStatus::Skipped
        } else if self.failures == 0 {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        }
    }
}

/// Keeps the detail with the lowest row index, then the lowest text.
fn offer_earliest(slot: &mut Option<(usize, String)>, row_index: usize, detail: &str) {
    let replace = match slot {
        Some((row, current)) => (row_index, detail) < (*row, current.as_str()),
        None => true,
    };
    if replace {
        *slot = Some((row_index, detail.to_string()));
    }
}

/// Mergeable aggregation state for a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialAggregate {
    /// Coalesced half-open row ranges seen so far
    row_spans: Vec<(usize, usize)>,
    tallies: Vec<RuleTally>,
}

impl PartialAggregate {
    /// Empty state for a catalog with `rule_count` rules.
    pub fn new(rule_count: usize) -> Self {
        Self {
            row_spans: Vec::new(),
            tallies: vec![RuleTally::default(); rule_count],
        }
    }

    pub fn for_catalog(catalog: &RuleCatalog) -> Self {
        Self::new(catalog.len())
    }

    /// Marks a row as processed.
    pub fn observe_row(&mut self, row_index: usize) {
        if let Some(last) = self.row_spans.last_mut() {
            if last.1 == row_index {
                last.1 += 1;
                return;
            }
            if last.0 <= row_index && row_index < last.1 {
                return;
            }
        }
        self.row_spans.push((row_index, row_index + 1));
        self.coalesce();
    }

    /// Marks a contiguous range of rows as processed.
    pub fn observe_rows(&mut self, rows: std::ops::Range<usize>) {
        if rows.is_empty() {
            return;
        }
        self.row_spans.push((rows.start, rows.end));
        self.coalesce();
    }

    fn coalesce(&mut self) {
        self.row_spans.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(self.row_spans.len());
        for &(start, end) in &self.row_spans {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        self.row_spans = merged;
    }

    /// Records one outcome for the rule at `rule_index`.
    pub fn record(&mut self, rule_index: usize, outcome: &RuleOutcome) {
        self.observe_row(outcome.row_index);
        if let Some(tally) = self.tallies.get_mut(rule_index) {
            tally.record(outcome);
        }
    }

    /// Records a full row of outcomes, in catalog order.
    pub fn record_row(&mut self, row_index: usize, outcomes: &[RuleOutcome]) {
        self.observe_row(row_index);
        for (rule_index, outcome) in outcomes.iter().enumerate() {
            if let Some(tally) = self.tallies.get_mut(rule_index) {
                tally.record(outcome);
            }
        }
    }

    /// Number of distinct rows seen.
    pub fn total_rows(&self) -> usize {
        self.row_spans.iter().map(|(start, end)| end - start).sum()
    }

    pub fn tally(&self, rule_index: usize) -> Option<&RuleTally> {
        self.tallies.get(rule_index)
    }

    pub fn is_empty(&self) -> bool {
        self.row_spans.is_empty()
    }

    /// Merges two partial states.
    pub fn merge_with(mut self, other: PartialAggregate) -> Result<Self> {
        if self.tallies.len() != other.tallies.len() {
            return Err(FocusError::Internal(format!(
                "cannot merge aggregates over {} and {} rules",
                self.tallies.len(),
                other.tallies.len()
            )));
        }
        self.row_spans.extend(other.row_spans);
        self.coalesce();
        for (mine, theirs) in self.tallies.iter_mut().zip(other.tallies) {
            mine.absorb(theirs);
        }
        Ok(self)
    }

    /// Merges any number of partial states.
    pub fn merge(states: Vec<Self>) -> Result<Self> {
        let mut iter = states.into_iter();
        let Some(first) = iter.next() else {
            return Ok(Self::default());
        };
        iter.try_fold(first, PartialAggregate::merge_with)
    }

    /// Turns the state into a report.
    pub fn finish(self, catalog: &RuleCatalog, complete: bool) -> ValidationReport {
        let total_rows = self.total_rows();
        let results = catalog
            .rules()
            .iter()
            .zip(self.tallies)
            .map(|(rule, tally)| check_result(rule, tally))
            .collect();
        ValidationReport::from_results(catalog.version(), total_rows, complete, results)
    }
}

fn check_result(rule: &Rule, tally: RuleTally) -> CheckResult {
    let status = tally.status();
    let error_message = match status {
        CheckStatus::Failed => Some(
            tally
                .first_detail
                .as_ref()
                .map(|(_, detail)| detail.clone())
                .unwrap_or_else(|| default_error_message(rule)),
        ),
        _ => None,
    };
    CheckResult {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        column: rule.target_column().map(str::to_string),
        status,
        violation_count: tally.failures,
        conflict_count: tally.conflicts,
        sample_values: if status == CheckStatus::Failed {
            tally.samples()
        } else {
            Vec::new()
        },
        error_message,
        conflict: tally.first_conflict.map(|(_, detail)| detail),
    }
}

/// Message used when no failing outcome carried a detail.
pub fn default_error_message(rule: &Rule) -> String {
    let column = rule.target_column().unwrap_or("value");
    match &rule.kind {
        RuleKind::Required => format!("{column} must not be null"),
        RuleKind::Forbidden => format!("{column} must be null"),
        RuleKind::Check { predicate } => format!("{predicate} must hold"),
        RuleKind::Conditional { when, then } => format!("{then} must hold when {when}"),
        RuleKind::Composite { mode, members } => match mode {
            CompositeMode::Or => format!("at least one of [{}] must pass", members.join(", ")),
            CompositeMode::And => format!("all of [{}] must pass", members.join(", ")),
        },
    }
}

/// Reduces outcomes into a [`ValidationReport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Builds the mergeable state for a batch of outcomes.
    pub fn partial(outcomes: &[RuleOutcome], catalog: &RuleCatalog) -> PartialAggregate {
        let mut partial = PartialAggregate::for_catalog(catalog);
        for outcome in outcomes {
            match catalog.rule_index(&outcome.rule_id) {
                Some(rule_index) => partial.record(rule_index, outcome),
                None => warn!(rule.id = %outcome.rule_id, "Outcome for a rule outside the catalog"),
            }
        }
        partial
    }

    /// Reduces a complete set of outcomes.
    ///
    /// `total_rows` counts the distinct rows that produced an outcome. A
    /// catalog without rules produces none; use [`ResultAggregator::reduce_rows`]
    /// or [`RuleEvaluator::validate`](super::RuleEvaluator::validate) when the
    /// row count must come from the dataset.
    #[instrument(skip(outcomes, catalog), fields(outcomes = outcomes.len(), catalog.version = %catalog.version()))]
    pub fn reduce(outcomes: &[RuleOutcome], catalog: &RuleCatalog) -> ValidationReport {
        Self::partial(outcomes, catalog).finish(catalog, true)
    }

    /// Reduces the outcomes of a dataset with `row_count` rows.
    pub fn reduce_rows(
        outcomes: &[RuleOutcome],
        catalog: &RuleCatalog,
        row_count: usize,
    ) -> ValidationReport {
        let mut partial = Self::partial(outcomes, catalog);
        partial.observe_rows(0..row_count);
        partial.finish(catalog, true)
    }
}
