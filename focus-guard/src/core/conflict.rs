//! Evaluation-time view of the contradicting rule pairs a catalog declares.

use crate::catalog::{RuleCatalog, RuleKind};
use crate::dataset::Row;
use crate::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Lenient rules that lose a conflict, mapped to the rules that beat them.
#[derive(Debug, Clone, Default)]
pub struct ConflictIndex {
    superseded_by: HashMap<usize, Vec<usize>>,
}

impl ConflictIndex {
    /// Builds the index from a catalog's conflicts.
    ///
    /// A pair involving a lenient rule must be decided by priority; an equal
    /// priority there is a [`FocusError::ConflictingRules`]. Ties between two
    /// strict rules are left alone: both are enforced as written.
    pub fn build(catalog: &RuleCatalog) -> Result<Self> {
        let rules = catalog.rules();
        let mut superseded_by: HashMap<usize, Vec<usize>> = HashMap::new();

        for conflict in catalog.conflicts() {
            let (first, second) = (&rules[conflict.first], &rules[conflict.second]);
            let managed = first.is_lenient() || second.is_lenient();

            match (conflict.winner, conflict.loser()) {
                (Some(winner), Some(loser)) => {
                    if rules[loser].is_lenient() {
                        let winners = superseded_by.entry(loser).or_default();
                        if !winners.contains(&winner) {
                            winners.push(winner);
                        }
                        debug!(
                            winner = %rules[winner].id,
                            loser = %rules[loser].id,
                            column = %conflict.column,
                            "Lenient rule superseded"
                        );
                    }
                }
                _ if managed => {
                    return Err(FocusError::ConflictingRules {
                        column: conflict.column.clone(),
                        first: first.id.clone(),
                        second: second.id.clone(),
                        priority: first.priority,
                    });
                }
                _ => {
                    warn!(
                        first = %first.id,
                        second = %second.id,
                        column = %conflict.column,
                        "Strict rules contradict with equal priority"
                    );
                }
            }
        }

        Ok(Self { superseded_by })
    }

    /// Rules that supersede `rule_index`, if any.
    pub fn winners_of(&self, rule_index: usize) -> &[usize] {
        self.superseded_by
            .get(&rule_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first winner that applies on `row`.
    pub fn superseding_rule(
        &self,
        rule_index: usize,
        row: &Row,
        catalog: &RuleCatalog,
    ) -> Option<usize> {
        self.winners_of(rule_index)
            .iter()
            .copied()
            .find(|&winner| applies(catalog, winner, row))
    }

    pub fn len(&self) -> usize {
        self.superseded_by.len()
    }

    pub fn is_empty(&self) -> bool {
        self.superseded_by.is_empty()
    }
}

/// Returns true if the rule's requirement is in force on `row`.
fn applies(catalog: &RuleCatalog, rule_index: usize, row: &Row) -> bool {
    match &catalog.rules()[rule_index].kind {
        RuleKind::Conditional { when, .. } => when.holds(row, catalog.patterns()),
        _ => true,
    }
}
