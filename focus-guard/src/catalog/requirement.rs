//! Per-column requirements derived from rules, and conflict detection.
//!
//! Every non-composite rule is reduced to one or more [`ColumnConstraint`]s:
//! "when `condition` holds, `column` must satisfy `requirement`". Two
//! constraints on the same column conflict when their requirements cannot
//! both hold and nothing proves their conditions are disjoint.

use super::rule::{Predicate, Rule, RuleKind};
use std::collections::HashSet;

/// What a rule demands of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    Null,
    NotNull,
    Equals(String),
    NotEquals(String),
    OneOf(Vec<String>),
    Range { min: Option<f64>, max: Option<f64> },
    Matches(String),
}

impl Requirement {
    /// Returns true if a value satisfying this requirement cannot be null.
    pub(crate) fn implies_value(&self) -> bool {
        !matches!(self, Requirement::Null | Requirement::NotEquals(_))
    }

    /// Returns true if no value can satisfy both requirements.
    pub fn contradicts(&self, other: &Requirement) -> bool {
        use Requirement::*;
        match (self, other) {
            (Null, b) | (b, Null) => b.implies_value(),
            (Equals(a), Equals(b)) => a != b,
            (Equals(a), NotEquals(b)) | (NotEquals(b), Equals(a)) => a == b,
            (Equals(a), OneOf(set)) | (OneOf(set), Equals(a)) => !set.contains(a),
            (OneOf(a), OneOf(b)) => {
                let a: HashSet<&String> = a.iter().collect();
                !b.iter().any(|v| a.contains(v))
            }
            (OneOf(set), NotEquals(v)) | (NotEquals(v), OneOf(set)) => {
                set.len() == 1 && set[0] == *v
            }
            _ => false,
        }
    }
}

/// A single-literal view of a predicate, if it has one.
fn literal(predicate: &Predicate) -> Option<(&str, Requirement)> {
    let pair = match predicate {
        Predicate::CheckNull { column } => (column.as_str(), Requirement::Null),
        Predicate::CheckNotNull { column } => (column.as_str(), Requirement::NotNull),
        Predicate::CheckValue { column, value } => {
            (column.as_str(), Requirement::Equals(value.clone()))
        }
        Predicate::CheckNotValue { column, value } => {
            (column.as_str(), Requirement::NotEquals(value.clone()))
        }
        Predicate::CheckIn { column, values } => {
            (column.as_str(), Requirement::OneOf(values.clone()))
        }
        Predicate::CheckRange { column, min, max } => (
            column.as_str(),
            Requirement::Range {
                min: *min,
                max: *max,
            },
        ),
        Predicate::CheckRegex { column, pattern } => {
            (column.as_str(), Requirement::Matches(pattern.clone()))
        }
        Predicate::AllOf { .. } | Predicate::AnyOf { .. } => return None,
    };
    Some(pair)
}

/// Conjunctive literals of a predicate; `AnyOf` branches are opaque.
fn conjuncts(predicate: &Predicate) -> Vec<(String, Requirement)> {
    match predicate {
        Predicate::AllOf { predicates } => predicates.iter().flat_map(conjuncts).collect(),
        Predicate::AnyOf { .. } => Vec::new(),
        other => literal(other)
            .map(|(c, r)| vec![(c.to_string(), r)])
            .unwrap_or_default(),
    }
}

/// "When `condition` holds, `column` must satisfy `requirement`."
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConstraint {
    /// Index of the originating rule in catalog order
    pub rule_index: usize,
    pub condition: Option<Predicate>,
    pub column: String,
    pub requirement: Requirement,
    /// False when derived from one branch of an `AnyOf`.
    pub firm: bool,
}

impl ColumnConstraint {
    fn condition_literals(&self) -> Vec<(String, Requirement)> {
        self.condition.as_ref().map(conjuncts).unwrap_or_default()
    }

    /// Returns true if both constraints can never apply to the same row.
    fn disjoint_with(&self, other: &ColumnConstraint) -> bool {
        let mine = self.condition_literals();
        let theirs = other.condition_literals();

        let clash = |a: &[(String, Requirement)], b: &[(String, Requirement)]| {
            a.iter().any(|(ca, ra)| {
                b.iter()
                    .any(|(cb, rb)| ca == cb && ra.contradicts(rb))
            })
        };

        // Either the conditions exclude each other, or one rule only applies
        // when the other rule's requirement is already violated.
        let own = [(self.column.clone(), self.requirement.clone())];
        let other_req = [(other.column.clone(), other.requirement.clone())];
        clash(&mine, &theirs) || clash(&mine, &other_req) || clash(&theirs, &own)
    }
}

fn push_requirements(
    rule_index: usize,
    condition: Option<&Predicate>,
    predicate: &Predicate,
    firm: bool,
    out: &mut Vec<ColumnConstraint>,
) {
    match predicate {
        Predicate::AllOf { predicates } => {
            for p in predicates {
                push_requirements(rule_index, condition, p, firm, out);
            }
        }
        Predicate::AnyOf { predicates } => {
            if let Some(first) = predicates.first() {
                push_requirements(rule_index, condition, first, false, out);
            }
        }
        other => {
            if let Some((column, requirement)) = literal(other) {
                out.push(ColumnConstraint {
                    rule_index,
                    condition: condition.cloned(),
                    column: column.to_string(),
                    requirement,
                    firm,
                });
            }
        }
    }
}

/// Reduces every non-composite rule to column constraints, in catalog order.
pub fn column_constraints(rules: &[Rule]) -> Vec<ColumnConstraint> {
    let mut out = Vec::new();
    for (rule_index, rule) in rules.iter().enumerate() {
        match &rule.kind {
            RuleKind::Required | RuleKind::Forbidden => {
                if let Some(column) = &rule.column {
                    let requirement = if rule.kind == RuleKind::Required {
                        Requirement::NotNull
                    } else {
                        Requirement::Null
                    };
                    out.push(ColumnConstraint {
                        rule_index,
                        condition: None,
                        column: column.clone(),
                        requirement,
                        firm: true,
                    });
                }
            }
            RuleKind::Check { predicate } => {
                push_requirements(rule_index, None, predicate, true, &mut out)
            }
            RuleKind::Conditional { when, then } => {
                push_requirements(rule_index, Some(when), then, true, &mut out)
            }
            RuleKind::Composite { .. } => {}
        }
    }
    out
}

/// A pair of rules whose requirements on one column contradict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConflict {
    pub column: String,
    /// Rule declared first in the catalog
    pub first: usize,
    /// Rule declared second in the catalog
    pub second: usize,
    /// Higher-priority rule, or `None` on a priority tie
    pub winner: Option<usize>,
}

impl RuleConflict {
    /// The losing rule, when the priorities decide one.
    pub fn loser(&self) -> Option<usize> {
        self.winner
            .map(|w| if w == self.first { self.second } else { self.first })
    }

    /// Returns true if `rule_index` is one side of this conflict.
    pub fn involves(&self, rule_index: usize) -> bool {
        self.first == rule_index || self.second == rule_index
    }
}

/// Finds every contradicting pair of firm constraints from different rules.
pub fn detect_conflicts(rules: &[Rule], constraints: &[ColumnConstraint]) -> Vec<RuleConflict> {
    let mut conflicts: Vec<RuleConflict> = Vec::new();
    for (i, a) in constraints.iter().enumerate() {
        for b in &constraints[i + 1..] {
            if a.rule_index == b.rule_index || a.column != b.column || !a.firm || !b.firm {
                continue;
            }
            if !a.requirement.contradicts(&b.requirement) || a.disjoint_with(b) {
                continue;
            }
            let (first, second) = if a.rule_index < b.rule_index {
                (a.rule_index, b.rule_index)
            } else {
                (b.rule_index, a.rule_index)
            };
            if conflicts
                .iter()
                .any(|c| c.first == first && c.second == second && c.column == a.column)
            {
                continue;
            }
            let (pa, pb) = (rules[first].priority, rules[second].priority);
            let winner = match pa.cmp(&pb) {
                std::cmp::Ordering::Greater => Some(first),
                std::cmp::Ordering::Less => Some(second),
                std::cmp::Ordering::Equal => None,
            };
            conflicts.push(RuleConflict {
                column: a.column.clone(),
                first,
                second,
                winner,
            });
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage_condition() -> Predicate {
        Predicate::all_of(vec![
            Predicate::value("ChargeCategory", "Usage"),
            Predicate::not_value("ChargeClass", "Correction"),
        ])
    }

    #[test]
    fn test_contradictions() {
        use Requirement::*;
        assert!(Null.contradicts(&NotNull));
        assert!(Null.contradicts(&Equals("x".into())));
        assert!(!Null.contradicts(&NotEquals("x".into())));
        assert!(Equals("a".into()).contradicts(&Equals("b".into())));
        assert!(!Equals("a".into()).contradicts(&OneOf(vec!["a".into(), "b".into()])));
        assert!(OneOf(vec!["a".into()]).contradicts(&OneOf(vec!["b".into()])));
        assert!(!NotNull.contradicts(&Range { min: Some(0.0), max: None }));
    }

    #[test]
    fn test_unconditional_forbidden_conflicts_with_conditional_required() {
        let rules = vec![
            Rule::conditional(
                "ListUnitPrice-C-005-C",
                "present for usage",
                usage_condition(),
                Predicate::not_null("ListUnitPrice"),
            )
            .with_priority(10),
            Rule::forbidden("ListUnitPrice-C-006-O", "null", "ListUnitPrice").lenient(),
        ];
        let constraints = column_constraints(&rules);
        let conflicts = detect_conflicts(&rules, &constraints);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].winner, Some(0));
        assert_eq!(conflicts[0].loser(), Some(1));
    }

    #[test]
    fn test_disjoint_conditions_do_not_conflict() {
        let rules = vec![
            Rule::conditional(
                "a",
                "a",
                Predicate::value("ChargeCategory", "Usage"),
                Predicate::not_null("ConsumedQuantity"),
            ),
            Rule::conditional(
                "b",
                "b",
                Predicate::value("ChargeCategory", "Tax"),
                Predicate::null("ConsumedQuantity"),
            ),
        ];
        let constraints = column_constraints(&rules);
        assert!(detect_conflicts(&rules, &constraints).is_empty());
    }

    #[test]
    fn test_self_gated_rule_does_not_conflict() {
        // Only applies when Tags has a value, which the forbidding rule excludes.
        let rules = vec![
            Rule::forbidden("Tags-C-002-O", "Tags null", "Tags"),
            Rule::conditional(
                "Tags-C-001-C",
                "Tags is JSON",
                Predicate::not_null("Tags"),
                Predicate::regex("Tags", "^\\{.*\\}$"),
            ),
        ];
        let constraints = column_constraints(&rules);
        assert!(detect_conflicts(&rules, &constraints).is_empty());
    }

    #[test]
    fn test_equal_priority_has_no_winner() {
        let rules = vec![
            Rule::required("a", "a", "Tags"),
            Rule::forbidden("b", "b", "Tags"),
        ];
        let constraints = column_constraints(&rules);
        let conflicts = detect_conflicts(&rules, &constraints);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].winner, None);
        assert_eq!(conflicts[0].loser(), None);
    }

    #[test]
    fn test_any_of_is_not_firm() {
        let rules = vec![
            Rule::check(
                "a",
                "a",
                Predicate::any_of(vec![
                    Predicate::null("InvoiceId"),
                    Predicate::not_null("BillingAccountId"),
                ]),
            ),
            Rule::required("b", "b", "InvoiceId"),
        ];
        let constraints = column_constraints(&rules);
        assert!(!constraints[0].firm);
        assert!(detect_conflicts(&rules, &constraints).is_empty());
    }
}
