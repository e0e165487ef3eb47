//! Report types shared by the aggregator, the formatters and the response boundary.

use serde::{Deserialize, Serialize};

/// Final status of one rule across a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Every applicable row passed
    Passed,
    /// At least one row failed
    Failed,
    /// The rule applied to no row
    Skipped,
}

/// Aggregated result for one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub rule_id: String,
    pub rule_name: String,
    pub column: Option<String>,
    pub status: CheckStatus,
    pub violation_count: usize,
    /// Rows where the rule was superseded by a higher-priority rule
    #[serde(default)]
    pub conflict_count: usize,
    /// Up to five distinct offending values in row order; null renders as `""`
    pub sample_values: Vec<String>,
    pub error_message: Option<String>,
    /// Detail of the earliest superseded row, naming the winning rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<String>,
}

impl CheckResult {
    pub fn is_passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == CheckStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == CheckStatus::Skipped
    }

    /// True when a higher-priority rule overrode this one on some row.
    pub fn is_superseded(&self) -> bool {
        self.conflict_count > 0
    }
}

/// Outcome of validating one dataset against one catalog.
///
/// Skipped rules are not part of `rules_checked`, so
/// `rules_checked == rules_passed + rules_failed` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub catalog_version: String,
    pub total_rows: usize,
    pub rules_checked: usize,
    pub rules_passed: usize,
    pub rules_failed: usize,
    pub rules_skipped: usize,
    /// False when a budget or cancellation stopped the run early
    pub complete: bool,
    pub results: Vec<CheckResult>,
}

impl ValidationReport {
    /// Builds a report from per-rule results in catalog order.
    pub fn from_results(
        catalog_version: impl Into<String>,
        total_rows: usize,
        complete: bool,
        results: Vec<CheckResult>,
    ) -> Self {
        let rules_passed = results.iter().filter(|r| r.is_passed()).count();
        let rules_failed = results.iter().filter(|r| r.is_failed()).count();
        let rules_skipped = results.iter().filter(|r| r.is_skipped()).count();
        Self {
            catalog_version: catalog_version.into(),
            total_rows,
            rules_checked: rules_passed + rules_failed,
            rules_passed,
            rules_failed,
            rules_skipped,
            complete,
            results,
        }
    }

    /// True when no rule failed.
    pub fn valid(&self) -> bool {
        self.rules_failed == 0
    }

    pub fn result(&self, rule_id: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.rule_id == rule_id)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| r.is_failed())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| r.is_skipped())
    }

    /// Share of checked rules that passed, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.rules_checked == 0 {
            100.0
        } else {
            (self.rules_passed as f64 / self.rules_checked as f64) * 100.0
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let mut summary = if self.valid() {
            format!(
                "All {} validation rules passed for {} rows.",
                self.rules_passed,
                group_thousands(self.total_rows)
            )
        } else {
            format!(
                "{} of {} rules failed. Please fix the errors and re-upload.",
                self.rules_failed, self.rules_checked
            )
        };
        if !self.complete {
            summary.push_str(&format!(
                " Validation stopped early after {} rows.",
                group_thousands(self.total_rows)
            ));
        }
        summary
    }

    /// Converts the report into the external response shape.
    pub fn to_response(&self, options: &ResponseOptions) -> ValidationResponse {
        let errors = self
            .failed()
            .map(|r| ValidationError {
                rule_id: r.rule_id.clone(),
                rule_name: r.rule_name.clone(),
                column: r.column.clone(),
                error_message: r
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Validation failed".to_string()),
                violation_count: r.violation_count,
                sample_values: r.sample_values.clone(),
            })
            .collect();

        let skipped = options.include_skipped.then(|| {
            self.skipped()
                .map(|r| SkippedRule {
                    rule_id: r.rule_id.clone(),
                    rule_name: r.rule_name.clone(),
                    column: r.column.clone(),
                })
                .collect()
        });

        let superseded = self
            .results
            .iter()
            .filter(|r| r.is_superseded())
            .map(|r| SupersededRule {
                rule_id: r.rule_id.clone(),
                rule_name: r.rule_name.clone(),
                column: r.column.clone(),
                conflict_count: r.conflict_count,
                detail: r
                    .conflict
                    .clone()
                    .unwrap_or_else(|| "conflict: superseded".to_string()),
            })
            .collect();

        ValidationResponse {
            valid: self.valid(),
            total_rows: self.total_rows,
            rules_checked: self.rules_checked,
            rules_passed: self.rules_passed,
            rules_failed: self.rules_failed,
            summary: self.summary(),
            errors,
            superseded,
            skipped,
            complete: self.complete,
        }
    }
}

/// Formats an integer with `,` thousands separators.
pub(crate) fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Knobs for [`ValidationReport::to_response`].
#[derive(Debug, Clone, Default)]
pub struct ResponseOptions {
    /// List the rules that applied to no row
    pub include_skipped: bool,
}

impl ResponseOptions {
    pub fn with_skipped(mut self, include: bool) -> Self {
        self.include_skipped = include;
        self
    }
}

/// One failed rule as the response reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub rule_id: String,
    pub rule_name: String,
    pub column: Option<String>,
    pub error_message: String,
    pub violation_count: usize,
    pub sample_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRule {
    pub rule_id: String,
    pub rule_name: String,
    pub column: Option<String>,
}

/// A lenient rule whose failures were overridden by a higher-priority rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupersededRule {
    pub rule_id: String,
    pub rule_name: String,
    pub column: Option<String>,
    pub conflict_count: usize,
    /// `conflict: superseded by <winner>`
    pub detail: String,
}

fn is_true(value: &bool) -> bool {
    *value
}

fn default_true() -> bool {
    true
}

/// The response handed to the reporting collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub total_rows: usize,
    pub rules_checked: usize,
    pub rules_passed: usize,
    pub rules_failed: usize,
    pub summary: String,
    pub errors: Vec<ValidationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded: Vec<SupersededRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<Vec<SkippedRule>>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, status: CheckStatus, violations: usize) -> CheckResult {
        CheckResult {
            rule_id: id.to_string(),
            rule_name: format!("{id} name"),
            column: Some("BilledCost".to_string()),
            status,
            violation_count: violations,
            conflict_count: 0,
            sample_values: if violations > 0 {
                vec![String::new()]
            } else {
                Vec::new()
            },
            error_message: (violations > 0).then(|| "BilledCost must not be null".to_string()),
            conflict: None,
        }
    }

    #[test]
    fn test_counts_exclude_skipped() {
        let report = ValidationReport::from_results(
            "1.2",
            3,
            true,
            vec![
                result("a", CheckStatus::Passed, 0),
                result("b", CheckStatus::Failed, 1),
                result("c", CheckStatus::Skipped, 0),
            ],
        );
        assert_eq!(report.rules_checked, 2);
        assert_eq!(report.rules_passed, 1);
        assert_eq!(report.rules_failed, 1);
        assert_eq!(report.rules_skipped, 1);
        assert!(!report.valid());
        assert_eq!(report.success_rate(), 50.0);
    }

    #[test]
    fn test_summaries() {
        let passing = ValidationReport::from_results(
            "1.2",
            10_000,
            true,
            vec![result("a", CheckStatus::Passed, 0)],
        );
        assert_eq!(
            passing.summary(),
            "All 1 validation rules passed for 10,000 rows."
        );

        let failing = ValidationReport::from_results(
            "1.2",
            3,
            true,
            vec![
                result("a", CheckStatus::Passed, 0),
                result("b", CheckStatus::Failed, 1),
            ],
        );
        assert_eq!(
            failing.summary(),
            "1 of 2 rules failed. Please fix the errors and re-upload."
        );
    }

    #[test]
    fn test_incomplete_summary() {
        let report = ValidationReport::from_results("1.2", 1_500, false, Vec::new());
        assert!(report.summary().ends_with("Validation stopped early after 1,500 rows."));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_response_shape() {
        let report = ValidationReport::from_results(
            "1.2",
            3,
            true,
            vec![
                result("b", CheckStatus::Failed, 1),
                result("c", CheckStatus::Skipped, 0),
            ],
        );

        let response = report.to_response(&ResponseOptions::default());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0]["violation_count"], 1);
        assert_eq!(json["errors"][0]["sample_values"][0], "");
        assert!(json.get("skipped").is_none());
        assert!(json.get("complete").is_none());
        assert!(json.get("superseded").is_none());

        let response = report.to_response(&ResponseOptions::default().with_skipped(true));
        let skipped = response.skipped.unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].rule_id, "c");
    }

    #[test]
    fn test_superseded_rules_are_listed() {
        let mut lenient = result("ListUnitPrice-C-006-O", CheckStatus::Passed, 0);
        lenient.conflict_count = 4;
        lenient.conflict = Some("conflict: superseded by ListUnitPrice-C-005-C".to_string());
        let report = ValidationReport::from_results(
            "1.2",
            4,
            true,
            vec![lenient, result("a", CheckStatus::Passed, 0)],
        );

        let response = report.to_response(&ResponseOptions::default());
        assert!(response.valid);
        assert_eq!(response.superseded.len(), 1);
        assert_eq!(response.superseded[0].rule_id, "ListUnitPrice-C-006-O");
        assert_eq!(response.superseded[0].conflict_count, 4);
        assert_eq!(
            response.superseded[0].detail,
            "conflict: superseded by ListUnitPrice-C-005-C"
        );
    }
}
