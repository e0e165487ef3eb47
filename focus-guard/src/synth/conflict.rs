//! What the synthesizer could not honour while generating rows.

use serde::Serialize;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// A rule that lost to another rule on the same column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictEntry {
    pub column: String,
    pub winner: String,
    pub loser: String,
    pub first_row: usize,
    pub last_row: usize,
    /// Number of rows on which the conflict arose
    pub rows: usize,
    /// True when both rules had the same priority and declaration order decided
    pub unresolved: bool,
}

impl ConflictEntry {
    pub fn row_range(&self) -> RangeInclusive<usize> {
        self.first_row..=self.last_row
    }
}

/// A requirement the generated value still does not meet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsatisfiedEntry {
    pub rule_id: String,
    pub column: String,
    pub reason: String,
    pub first_row: usize,
    pub last_row: usize,
    pub rows: usize,
}

impl UnsatisfiedEntry {
    pub fn row_range(&self) -> RangeInclusive<usize> {
        self.first_row..=self.last_row
    }
}

/// Conflicts and unsatisfied requirements of one synthesis run, in order
/// of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<ConflictEntry>,
    pub unsatisfied: Vec<UnsatisfiedEntry>,
    #[serde(skip)]
    conflict_index: HashMap<(String, String, String), usize>,
    #[serde(skip)]
    unsatisfied_index: HashMap<(String, String, String), usize>,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes that `loser` gave way to `winner` on `column` at `row`.
    pub fn record_conflict(
        &mut self,
        column: &str,
        winner: &str,
        loser: &str,
        row: usize,
        unresolved: bool,
    ) {
        let key = (column.to_string(), winner.to_string(), loser.to_string());
        match self.conflict_index.get(&key) {
            Some(&position) => {
                let entry = &mut self.conflicts[position];
                entry.last_row = entry.last_row.max(row);
                entry.first_row = entry.first_row.min(row);
                entry.rows += 1;
                entry.unresolved |= unresolved;
            }
            None => {
                self.conflict_index.insert(key, self.conflicts.len());
                self.conflicts.push(ConflictEntry {
                    column: column.to_string(),
                    winner: winner.to_string(),
                    loser: loser.to_string(),
                    first_row: row,
                    last_row: row,
                    rows: 1,
                    unresolved,
                });
            }
        }
    }

    /// Notes that `rule_id` could not be met on `column` at `row`.
    pub fn record_unsatisfied(&mut self, rule_id: &str, column: &str, reason: &str, row: usize) {
        let key = (rule_id.to_string(), column.to_string(), reason.to_string());
        match self.unsatisfied_index.get(&key) {
            Some(&position) => {
                let entry = &mut self.unsatisfied[position];
                entry.last_row = entry.last_row.max(row);
                entry.first_row = entry.first_row.min(row);
                entry.rows += 1;
            }
            None => {
                self.unsatisfied_index.insert(key, self.unsatisfied.len());
                self.unsatisfied.push(UnsatisfiedEntry {
                    rule_id: rule_id.to_string(),
                    column: column.to_string(),
                    reason: reason.to_string(),
                    first_row: row,
                    last_row: row,
                    rows: 1,
                });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty() && self.unsatisfied.is_empty()
    }

    /// Returns true if any conflict was decided by declaration order alone.
    pub fn has_unresolved(&self) -> bool {
        self.conflicts.iter().any(|c| c.unresolved)
    }

    /// Ids of every rule that lost a conflict.
    pub fn losers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for conflict in &self.conflicts {
            if !out.contains(&conflict.loser.as_str()) {
                out.push(&conflict.loser);
            }
        }
        out
    }

    pub fn conflict(&self, loser: &str) -> Option<&ConflictEntry> {
        self.conflicts.iter().find(|c| c.loser == loser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_coalesced_per_pair() {
        let mut report = ConflictReport::new();
        report.record_conflict("Tags", "a", "b", 3, false);
        report.record_conflict("Tags", "a", "b", 7, false);
        report.record_conflict("Tags", "a", "b", 5, true);
        report.record_conflict("Tags", "c", "b", 1, false);

        assert_eq!(report.conflicts.len(), 2);
        let first = &report.conflicts[0];
        assert_eq!(first.row_range(), 3..=7);
        assert_eq!(first.rows, 3);
        assert!(first.unresolved);
        assert!(report.has_unresolved());
        assert_eq!(report.losers(), vec!["b"]);
    }

    #[test]
    fn test_unsatisfied_entries() {
        let mut report = ConflictReport::new();
        assert!(report.is_empty());
        report.record_unsatisfied("r1", "SkuId", "no value matches /^x$/", 0);
        report.record_unsatisfied("r1", "SkuId", "no value matches /^x$/", 1);
        assert_eq!(report.unsatisfied.len(), 1);
        assert_eq!(report.unsatisfied[0].row_range(), 0..=1);
        assert!(!report.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("conflict_index").is_none());
        assert_eq!(json["unsatisfied"][0]["rows"], 2);
    }
}
