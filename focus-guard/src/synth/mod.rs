//! Constraint-driven synthesis of FOCUS datasets.
//!
//! [`DataSynthesizer::generate`] produces rows that satisfy a catalog:
//!
//! 1. [`SynthesisPlan::build`] orders the catalog's columns so that every
//!    column comes after the columns its generator and its rule conditions
//!    read.
//! 2. For each row a [`generators::BaseDraw`] is taken from a `StdRng`
//!    seeded with the caller's seed.
//! 3. Each column gets its generator's natural value, then the requirements
//!    of every rule whose condition holds on the partial row are applied.
//!    Contradicting requirements are settled by priority; the losers go to
//!    the [`ConflictReport`].
//!
//! The same catalog, row count and seed always produce the same dataset.
//!
//! ```rust
//! use focus_guard::catalog::CatalogRegistry;
//! use focus_guard::synth::DataSynthesizer;
//!
//! # fn main() -> focus_guard::prelude::Result<()> {
//! let catalog = CatalogRegistry::global().resolve("1.2")?;
//! let (dataset, conflicts) = DataSynthesizer::default().generate(&catalog, 10, 42)?;
//!
//! assert_eq!(dataset.len(), 10);
//! assert!(!conflicts.has_unresolved());
//! # Ok(())
//! # }
//! ```

mod conflict;
pub mod generators;
mod plan;
mod reference;

pub use conflict::{ConflictEntry, ConflictReport, UnsatisfiedEntry};
pub use plan::{SynthesisPlan, SynthesisStep};
pub use reference::{AccountRef, ReferenceValues, RegionRef, ServiceRef};

use crate::catalog::{ColumnConstraint, PatternCache, Requirement, RuleCatalog};
use crate::dataset::{Dataset, Row, Scalar};
use crate::logging::LogConfig;
use crate::prelude::*;
use generators::{fallback_value, format_amount, natural_value, BaseDraw, GeneratorContext};
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Synthesizer settings.
#[derive(Debug, Clone, Default)]
pub struct SynthesizerConfig {
    pub reference: ReferenceValues,
    pub log: LogConfig,
}

impl SynthesizerConfig {
    pub fn with_reference(mut self, reference: ReferenceValues) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

/// Generates datasets that satisfy a rule catalog.
#[derive(Debug, Clone, Default)]
pub struct DataSynthesizer {
    config: SynthesizerConfig,
}

impl DataSynthesizer {
    pub fn new(config: SynthesizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Generates `row_count` rows for `catalog` from `seed`.
    ///
    /// Fails with [`FocusError::CyclicConstraint`] when the catalog's
    /// columns cannot be ordered, and with [`FocusError::Configuration`]
    /// when the reference pools are unusable. Rule conflicts never fail a
    /// run; they are returned in the [`ConflictReport`].
    #[instrument(skip(self, catalog), fields(catalog.version = %catalog.version()))]
    pub fn generate(
        &self,
        catalog: &RuleCatalog,
        row_count: usize,
        seed: u64,
    ) -> Result<(Dataset, ConflictReport)> {
        if let Some(problem) = self.config.reference.problem() {
            return Err(FocusError::Configuration(problem));
        }

        let started = Instant::now();
        let plan = SynthesisPlan::build(catalog)?;
        let generated: HashSet<String> = catalog.columns().iter().cloned().collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut report = ConflictReport::new();
        let mut dataset = Dataset::new(catalog.columns().iter().cloned())?;

        for row_index in 0..row_count {
            let draw = BaseDraw::draw(&mut rng, &self.config.reference);
            let ctx = GeneratorContext {
                reference: &self.config.reference,
                columns: &generated,
                row_index,
                draw: &draw,
            };

            let mut row = Row::new();
            for step in plan.steps() {
                let natural = natural_value(&step.column, &row, &ctx);
                row.set(step.column.as_str(), natural.map(Scalar::String));
                apply_constraints(catalog, &plan, &step.column, &mut row, &ctx, &mut report);
            }
            dataset.push_row(row)?;
        }

        for conflict in report.conflicts.iter().filter(|c| c.unresolved) {
            warn!(
                column = %conflict.column,
                winner = %conflict.winner,
                loser = %conflict.loser,
                rows = conflict.rows,
                "Equal-priority rules contradict; the first declared rule was applied"
            );
        }
        for entry in &report.unsatisfied {
            warn!(
                rule.id = %entry.rule_id,
                column = %entry.column,
                reason = %self.config.log.field(&entry.reason),
                rows = entry.rows,
                "Requirement could not be met"
            );
        }
        crate::log_data_op!(
            self.config.log,
            rows = dataset.len(),
            columns = dataset.columns().len(),
            conflicts = report.conflicts.len(),
            unsatisfied = report.unsatisfied.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Synthesized dataset"
        );
        if report.is_empty() {
            info!(seed, "Synthesis completed without conflicts");
        }

        Ok((dataset, report))
    }
}

/// Applies the constraints on `column` whose conditions hold on `row`.
///
/// A condition may read `column` itself, so the applicable set is
/// recomputed after every change of value until neither moves. The loop is
/// bounded by the number of constraints on the column; whatever remains
/// unmet afterwards is reported.
fn apply_constraints(
    catalog: &RuleCatalog,
    plan: &SynthesisPlan,
    column: &str,
    row: &mut Row,
    ctx: &GeneratorContext<'_>,
    report: &mut ConflictReport,
) {
    let rules = catalog.rules();
    let patterns = catalog.patterns();
    let candidates = plan.constraints_for(column);
    if candidates.is_empty() {
        return;
    }

    let mut applicable = applicable_now(catalog, candidates, row);
    let mut value = row.get(column).map(ToString::to_string);
    for _ in 0..=candidates.len() {
        if applicable.is_empty() {
            break;
        }
        let (accepted, _) = resolve(catalog, &applicable);
        value = settle(column, &accepted, value, row, ctx, patterns);
        row.set(column, value.clone().map(Scalar::String));

        let next = applicable_now(catalog, candidates, row);
        if next == applicable {
            break;
        }
        applicable = next;
    }

    let (accepted, superseded) = resolve(catalog, &applicable);
    for (winner, loser) in superseded {
        if loser.firm {
            let (w, l) = (&rules[winner.rule_index], &rules[loser.rule_index]);
            report.record_conflict(column, &w.id, &l.id, ctx.row_index, w.priority == l.priority);
        }
    }
    for constraint in &accepted {
        if !satisfied(&constraint.requirement, value.as_deref(), patterns) {
            report.record_unsatisfied(
                &rules[constraint.rule_index].id,
                column,
                &describe(&constraint.requirement),
                ctx.row_index,
            );
        }
    }
}

/// Indices of the constraints in `candidates` whose conditions hold on `row`.
fn applicable_now(catalog: &RuleCatalog, candidates: &[usize], row: &Row) -> Vec<usize> {
    let all = catalog.constraints();
    candidates
        .iter()
        .copied()
        .filter(|&i| {
            all[i]
                .condition
                .as_ref()
                .map_or(true, |condition| condition.holds(row, catalog.patterns()))
        })
        .collect()
}

/// Orders constraints by firmness then priority and keeps every one that
/// contradicts no constraint kept before it. Returns the kept constraints in
/// application order and each dropped one with the constraint it lost to.
fn resolve<'a>(
    catalog: &'a RuleCatalog,
    applicable: &[usize],
) -> (Vec<&'a ColumnConstraint>, Vec<(&'a ColumnConstraint, &'a ColumnConstraint)>) {
    let rules = catalog.rules();
    let all = catalog.constraints();

    let mut ordered: Vec<&ColumnConstraint> = applicable.iter().map(|&i| &all[i]).collect();
    ordered.sort_by_key(|c| (!c.firm, Reverse(rules[c.rule_index].priority), c.rule_index));

    let mut accepted: Vec<&ColumnConstraint> = Vec::with_capacity(ordered.len());
    let mut superseded = Vec::new();
    for candidate in ordered {
        let winner = accepted.iter().copied().find(|a| {
            a.rule_index != candidate.rule_index && a.requirement.contradicts(&candidate.requirement)
        });
        match winner {
            Some(winner) => superseded.push((winner, candidate)),
            None => accepted.push(candidate),
        }
    }

    accepted.sort_by_key(|c| application_rank(&c.requirement));
    (accepted, superseded)
}

/// Moves `value` towards a value every accepted requirement allows.
fn settle(
    column: &str,
    accepted: &[&ColumnConstraint],
    mut value: Option<String>,
    row: &Row,
    ctx: &GeneratorContext<'_>,
    patterns: &PatternCache,
) -> Option<String> {
    let needs_value = accepted.iter().any(|c| c.requirement.implies_value());

    for constraint in accepted {
        value = match &constraint.requirement {
            Requirement::Null => None,
            Requirement::Equals(expected) => Some(expected.clone()),
            Requirement::OneOf(allowed) => match value {
                Some(v) if allowed.contains(&v) => Some(v),
                other => allowed.first().cloned().or(other),
            },
            Requirement::Range { min, max } => {
                let current = value.as_deref().and_then(|v| v.trim().parse::<f64>().ok());
                match current {
                    Some(x) if in_range(x, *min, *max) => value,
                    Some(x) => Some(format_amount(clamp(x, *min, *max))),
                    None => Some(format_amount(min.or(*max).unwrap_or(0.0))),
                }
            }
            Requirement::Matches(pattern) => {
                if value.as_deref().is_some_and(|v| matches(patterns, pattern, v)) {
                    value
                } else {
                    let candidate = fallback_value(column, row, ctx);
                    if matches(patterns, pattern, &candidate) {
                        Some(candidate)
                    } else {
                        value
                    }
                }
            }
            Requirement::NotNull => value.or_else(|| Some(fallback_value(column, row, ctx))),
            Requirement::NotEquals(forbidden) => match value {
                Some(v) if v == *forbidden => {
                    if needs_value {
                        Some(
                            alternative(column, forbidden, accepted, row, ctx, patterns)
                                .unwrap_or(v),
                        )
                    } else {
                        None
                    }
                }
                other => other,
            },
        };
    }
    value
}

/// First value other than `forbidden` that every accepted requirement
/// allows: the allowed lists in application order, then the column's
/// fallback.
fn alternative(
    column: &str,
    forbidden: &str,
    accepted: &[&ColumnConstraint],
    row: &Row,
    ctx: &GeneratorContext<'_>,
    patterns: &PatternCache,
) -> Option<String> {
    let allowed = accepted.iter().flat_map(|c| match &c.requirement {
        Requirement::OneOf(values) => values.as_slice(),
        Requirement::Equals(expected) => std::slice::from_ref(expected),
        _ => &[][..],
    });
    allowed
        .cloned()
        .chain(std::iter::once(fallback_value(column, row, ctx)))
        .find(|candidate| {
            candidate != forbidden
                && accepted
                    .iter()
                    .all(|c| satisfied(&c.requirement, Some(candidate.as_str()), patterns))
        })
}

fn application_rank(requirement: &Requirement) -> u8 {
    match requirement {
        Requirement::Null => 0,
        Requirement::Equals(_) => 1,
        Requirement::OneOf(_) => 2,
        Requirement::Range { .. } => 3,
        Requirement::Matches(_) => 4,
        Requirement::NotNull => 5,
        Requirement::NotEquals(_) => 6,
    }
}

fn in_range(x: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |m| x >= m) && max.map_or(true, |m| x <= m)
}

fn clamp(x: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let x = min.map_or(x, |m| x.max(m));
    max.map_or(x, |m| x.min(m))
}

fn matches(patterns: &PatternCache, pattern: &str, value: &str) -> bool {
    match patterns.get(pattern) {
        Some(regex) => regex.is_match(value),
        None => Regex::new(pattern).is_ok_and(|regex| regex.is_match(value)),
    }
}

fn satisfied(requirement: &Requirement, value: Option<&str>, patterns: &PatternCache) -> bool {
    match (requirement, value) {
        (Requirement::Null, v) => v.is_none(),
        (Requirement::NotNull, v) => v.is_some(),
        (Requirement::NotEquals(forbidden), v) => v != Some(forbidden.as_str()),
        (_, None) => false,
        (Requirement::Equals(expected), Some(v)) => v == expected,
        (Requirement::OneOf(allowed), Some(v)) => allowed.iter().any(|a| a == v),
        (Requirement::Range { min, max }, Some(v)) => v
            .trim()
            .parse::<f64>()
            .is_ok_and(|x| in_range(x, *min, *max)),
        (Requirement::Matches(pattern), Some(v)) => matches(patterns, pattern, v),
    }
}

fn describe(requirement: &Requirement) -> String {
    match requirement {
        Requirement::Null => "value must be null".to_string(),
        Requirement::NotNull => "value must not be null".to_string(),
        Requirement::Equals(v) => format!("value must equal '{v}'"),
        Requirement::NotEquals(v) => format!("value must differ from '{v}'"),
        Requirement::OneOf(values) => format!("value must be one of {values:?}"),
        Requirement::Range { min, max } => format!("value must lie in [{min:?}, {max:?}]"),
        Requirement::Matches(pattern) => format!("no generated value matches /{pattern}/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Predicate, Rule};

    fn synth() -> DataSynthesizer {
        DataSynthesizer::default()
    }

    #[test]
    fn test_row_shape_follows_catalog_columns() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["BilledCost", "ChargeCategory", "ListUnitPrice"])
            .rule(Rule::required("BilledCost-C-001-M", "BilledCost", "BilledCost"))
            .build()
            .unwrap();
        let (dataset, report) = synth().generate(&catalog, 5, 1).unwrap();

        assert_eq!(dataset.columns(), catalog.columns());
        assert_eq!(dataset.len(), 5);
        assert!(report.is_empty());
        for row in dataset.rows() {
            assert_eq!(row.get("ChargeCategory").map(ToString::to_string).as_deref(), Some("Usage"));
            assert!(row.get("BilledCost").and_then(Scalar::as_f64).is_some());
        }
    }

    #[test]
    fn test_required_on_empty_column_uses_fallback() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["ChargeClass", "Tags"])
            .rule(Rule::required("ChargeClass-X", "ChargeClass", "ChargeClass"))
            .rule(Rule::check(
                "Tags-X",
                "Tags object",
                Predicate::regex("Tags", r"^\{.*\}$"),
            ))
            .build()
            .unwrap();
        let (dataset, report) = synth().generate(&catalog, 3, 7).unwrap();

        assert!(report.is_empty());
        for row in dataset.rows() {
            assert_eq!(row.get("ChargeClass").map(ToString::to_string).as_deref(), Some("Correction"));
            assert_eq!(row.get("Tags").map(ToString::to_string).as_deref(), Some("{}"));
        }
    }

    #[test]
    fn test_priority_decides_conflicts() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["ChargeCategory", "ListUnitPrice"])
            .rule(
                Rule::conditional(
                    "ListUnitPrice-C-005-C",
                    "ListUnitPrice for usage",
                    Predicate::value("ChargeCategory", "Usage"),
                    Predicate::not_null("ListUnitPrice"),
                )
                .with_priority(10),
            )
            .rule(Rule::forbidden("ListUnitPrice-C-006-O", "ListUnitPrice null", "ListUnitPrice").lenient())
            .build()
            .unwrap();
        let (dataset, report) = synth().generate(&catalog, 4, 3).unwrap();

        assert!(dataset.rows().iter().all(|r| !r.is_null("ListUnitPrice")));
        let entry = report.conflict("ListUnitPrice-C-006-O").unwrap();
        assert_eq!(entry.winner, "ListUnitPrice-C-005-C");
        assert_eq!(entry.row_range(), 0..=3);
        assert_eq!(entry.rows, 4);
        assert!(!entry.unresolved);
    }

    #[test]
    fn test_equal_priority_conflict_is_unresolved() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["Tags"])
            .rule(Rule::required("first", "first", "Tags"))
            .rule(Rule::forbidden("second", "second", "Tags"))
            .build()
            .unwrap();
        let (dataset, report) = synth().generate(&catalog, 2, 0).unwrap();

        assert!(dataset.rows().iter().all(|r| !r.is_null("Tags")));
        assert!(report.has_unresolved());
        assert_eq!(report.losers(), vec!["second"]);
    }

    #[test]
    fn test_unmatchable_regex_is_reported() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["SkuId"])
            .rule(Rule::check("SkuId-X", "SkuId shape", Predicate::regex("SkuId", "^sku-[0-9]+$")))
            .build()
            .unwrap();
        let (_, report) = synth().generate(&catalog, 2, 0).unwrap();

        assert_eq!(report.unsatisfied.len(), 1);
        assert_eq!(report.unsatisfied[0].rule_id, "SkuId-X");
        assert_eq!(report.unsatisfied[0].rows, 2);
    }

    #[test]
    fn test_range_and_allowed_values_are_enforced() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["BilledCost", "PricingCategory"])
            .rule(Rule::check(
                "BilledCost-X",
                "BilledCost at least 500",
                Predicate::range("BilledCost", Some(500.0), None),
            ))
            .rule(Rule::check(
                "PricingCategory-X",
                "Committed only",
                Predicate::one_of("PricingCategory", ["Committed"]),
            ))
            .build()
            .unwrap();
        let (dataset, report) = synth().generate(&catalog, 3, 9).unwrap();

        assert!(report.is_empty());
        for row in dataset.rows() {
            assert_eq!(row.get("BilledCost").and_then(Scalar::as_f64), Some(500.0));
            assert_eq!(
                row.get("PricingCategory").map(ToString::to_string).as_deref(),
                Some("Committed")
            );
        }
    }

    #[test]
    fn test_empty_reference_pool_is_a_configuration_error() {
        let config = SynthesizerConfig::default()
            .with_reference(ReferenceValues::default().with_services(Vec::new()));
        let catalog = RuleCatalog::builder("1.2")
            .columns(["BilledCost"])
            .build()
            .unwrap();
        let err = DataSynthesizer::new(config).generate(&catalog, 1, 0).unwrap_err();
        assert!(matches!(err, FocusError::Configuration(_)));
    }

    #[test]
    fn test_condition_on_own_column_is_rechecked() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["ChargeClass"])
            .rule(Rule::required("ChargeClass-X-001", "ChargeClass present", "ChargeClass"))
            .rule(Rule::conditional(
                "ChargeClass-X-002",
                "Present ChargeClass is an adjustment",
                Predicate::not_null("ChargeClass"),
                Predicate::value("ChargeClass", "Adjustment"),
            ))
            .build()
            .unwrap();
        let (dataset, report) = synth().generate(&catalog, 3, 42).unwrap();

        assert!(report.is_empty());
        for row in dataset.rows() {
            assert_eq!(
                row.get("ChargeClass").map(ToString::to_string).as_deref(),
                Some("Adjustment")
            );
        }
    }

    #[test]
    fn test_excluded_value_moves_to_an_allowed_one() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["BilledCost", "ChargeCategory"])
            .rule(Rule::conditional(
                "ChargeCategory-X-001",
                "Billed rows are purchases",
                Predicate::not_null("BilledCost"),
                Predicate::all_of(vec![
                    Predicate::one_of("ChargeCategory", ["Usage", "Purchase"]),
                    Predicate::not_value("ChargeCategory", "Usage"),
                ]),
            ))
            .build()
            .unwrap();
        let (dataset, report) = synth().generate(&catalog, 4, 42).unwrap();

        assert!(report.is_empty());
        for row in dataset.rows() {
            assert_eq!(
                row.get("ChargeCategory").map(ToString::to_string).as_deref(),
                Some("Purchase")
            );
        }
    }

    #[test]
    fn test_excluded_value_without_other_requirements_becomes_null() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["ChargeCategory"])
            .rule(Rule::check(
                "ChargeCategory-X-002",
                "ChargeCategory is not usage",
                Predicate::not_value("ChargeCategory", "Usage"),
            ))
            .build()
            .unwrap();
        let (dataset, report) = synth().generate(&catalog, 2, 42).unwrap();

        assert!(report.is_empty());
        assert!(dataset.rows().iter().all(|r| r.is_null("ChargeCategory")));
    }
}
