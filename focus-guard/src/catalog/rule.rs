//! Rule definitions: the closed set of rule shapes a catalog may contain.

use serde::{Deserialize, Serialize};

/// How a composite rule combines its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMode {
    /// Every applicable member must pass
    #[serde(alias = "AND")]
    And,
    /// At least one member must pass
    #[serde(alias = "OR")]
    Or,
}

/// Declared policy for a rule that contradicts a higher-priority rule.
///
/// A `Lenient` rule that loses a conflict is reported as conflicted instead
/// of failed on the rows where the winning rule applies. `Strict` rules are
/// always enforced as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    #[default]
    Strict,
    Lenient,
}

/// A pure, single-row test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Column equals the expected value
    CheckValue { column: String, value: String },
    /// Column does not equal the value (holds for null)
    CheckNotValue { column: String, value: String },
    /// Column has no value
    CheckNull { column: String },
    /// Column has a value
    CheckNotNull { column: String },
    /// Column is numeric and within the inclusive bounds
    CheckRange {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Column matches a regular expression
    CheckRegex { column: String, pattern: String },
    /// Column is one of the listed values
    CheckIn { column: String, values: Vec<String> },
    /// Every nested predicate holds
    AllOf { predicates: Vec<Predicate> },
    /// At least one nested predicate holds
    AnyOf { predicates: Vec<Predicate> },
}

impl Predicate {
    pub fn value(column: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::CheckValue {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn not_value(column: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::CheckNotValue {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn null(column: impl Into<String>) -> Self {
        Predicate::CheckNull {
            column: column.into(),
        }
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Predicate::CheckNotNull {
            column: column.into(),
        }
    }

    pub fn range(column: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Predicate::CheckRange {
            column: column.into(),
            min,
            max,
        }
    }

    pub fn regex(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::CheckRegex {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn one_of<I, S>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::CheckIn {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn all_of(predicates: Vec<Predicate>) -> Self {
        Predicate::AllOf { predicates }
    }

    pub fn any_of(predicates: Vec<Predicate>) -> Self {
        Predicate::AnyOf { predicates }
    }

    /// Every column this predicate reads, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::AllOf { predicates } | Predicate::AnyOf { predicates } => {
                for p in predicates {
                    p.collect_columns(out);
                }
            }
            Predicate::CheckValue { column, .. }
            | Predicate::CheckNotValue { column, .. }
            | Predicate::CheckNull { column }
            | Predicate::CheckNotNull { column }
            | Predicate::CheckRange { column, .. }
            | Predicate::CheckRegex { column, .. }
            | Predicate::CheckIn { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
        }
    }

    /// First column this predicate reads.
    pub fn primary_column(&self) -> Option<&str> {
        self.columns().first().copied()
    }

    /// Every regex pattern used anywhere in the tree.
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            Predicate::CheckRegex { pattern, .. } => vec![pattern.as_str()],
            Predicate::AllOf { predicates } | Predicate::AnyOf { predicates } => {
                predicates.iter().flat_map(Predicate::patterns).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// The shape of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// The rule's column must have a value
    Required,
    /// The rule's column must be null or absent
    Forbidden,
    /// An unconditional predicate
    Check { predicate: Predicate },
    /// `then` applies only on rows where `when` holds
    Conditional { when: Predicate, then: Predicate },
    /// Combination of other rules by id
    Composite {
        mode: CompositeMode,
        members: Vec<String>,
    },
}

/// One rule of a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub kind: RuleKind,
    /// Filled in from the catalog when it is loaded.
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub strictness: Strictness,
    /// Higher priority wins a conflict.
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Rule {
    fn with_kind(id: impl Into<String>, name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column: None,
            kind,
            version: String::new(),
            strictness: Strictness::Strict,
            priority: 0,
            description: None,
        }
    }

    /// `column` must have a value on every row.
    pub fn required(
        id: impl Into<String>,
        name: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self::with_kind(id, name, RuleKind::Required).with_column(column)
    }

    /// `column` must be null on every row.
    pub fn forbidden(
        id: impl Into<String>,
        name: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self::with_kind(id, name, RuleKind::Forbidden).with_column(column)
    }

    /// `predicate` must hold on every row.
    pub fn check(id: impl Into<String>, name: impl Into<String>, predicate: Predicate) -> Self {
        let column = predicate.primary_column().map(str::to_string);
        let mut rule = Self::with_kind(id, name, RuleKind::Check { predicate });
        rule.column = column;
        rule
    }

    /// `then` must hold on every row where `when` holds.
    pub fn conditional(
        id: impl Into<String>,
        name: impl Into<String>,
        when: Predicate,
        then: Predicate,
    ) -> Self {
        let column = then.primary_column().map(str::to_string);
        let mut rule = Self::with_kind(id, name, RuleKind::Conditional { when, then });
        rule.column = column;
        rule
    }

    /// Combination of the member rules.
    pub fn composite<I, S>(
        id: impl Into<String>,
        name: impl Into<String>,
        mode: CompositeMode,
        members: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members.into_iter().map(Into::into).collect();
        Self::with_kind(id, name, RuleKind::Composite { mode, members })
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn lenient(self) -> Self {
        self.with_strictness(Strictness::Lenient)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true for composite rules.
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, RuleKind::Composite { .. })
    }

    pub fn is_lenient(&self) -> bool {
        self.strictness == Strictness::Lenient
    }

    /// The column whose values are reported as samples when this rule fails.
    pub fn target_column(&self) -> Option<&str> {
        if let Some(column) = &self.column {
            return Some(column);
        }
        match &self.kind {
            RuleKind::Check { predicate } => predicate.primary_column(),
            RuleKind::Conditional { then, .. } => then.primary_column(),
            _ => None,
        }
    }

    /// The predicates this rule evaluates directly (composites have none).
    pub fn predicates(&self) -> Vec<&Predicate> {
        match &self.kind {
            RuleKind::Check { predicate } => vec![predicate],
            RuleKind::Conditional { when, then } => vec![when, then],
            _ => Vec::new(),
        }
    }

    /// Every column the rule reads.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.column.as_deref().into_iter().collect();
        for predicate in self.predicates() {
            for column in predicate.columns() {
                if !out.contains(&column) {
                    out.push(column);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_json_shape() {
        let json = r#"{
            "id": "ListUnitPrice-C-005-C",
            "name": "ListUnitPrice present for usage",
            "kind": {
                "type": "conditional",
                "when": {"op": "all_of", "predicates": [
                    {"op": "check_value", "column": "ChargeCategory", "value": "Usage"},
                    {"op": "check_not_value", "column": "ChargeClass", "value": "Correction"}
                ]},
                "then": {"op": "check_not_null", "column": "ListUnitPrice"}
            },
            "priority": 10
        }"#;

        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.strictness, Strictness::Strict);
        assert_eq!(rule.priority, 10);
        assert_eq!(rule.target_column(), Some("ListUnitPrice"));
        assert_eq!(
            rule.referenced_columns(),
            vec!["ChargeCategory", "ChargeClass", "ListUnitPrice"]
        );
    }

    #[test]
    fn test_composite_mode_aliases() {
        let mode: CompositeMode = serde_json::from_str("\"OR\"").unwrap();
        assert_eq!(mode, CompositeMode::Or);
        let mode: CompositeMode = serde_json::from_str("\"and\"").unwrap();
        assert_eq!(mode, CompositeMode::And);
    }

    #[test]
    fn test_unknown_rule_shape_is_rejected() {
        let json = r#"{"id": "x", "name": "x", "kind": {"type": "maybe"}}"#;
        assert!(serde_json::from_str::<Rule>(json).is_err());
    }

    #[test]
    fn test_builders_derive_column() {
        let rule = Rule::check("r", "r", Predicate::regex("BillingCurrency", "^[A-Z]{3}$"));
        assert_eq!(rule.column.as_deref(), Some("BillingCurrency"));

        let composite = Rule::composite("c", "c", CompositeMode::Or, ["a", "b"]);
        assert!(composite.is_composite());
        assert_eq!(composite.target_column(), None);
        assert!(composite.predicates().is_empty());
    }

    #[test]
    fn test_predicate_patterns() {
        let p = Predicate::all_of(vec![
            Predicate::regex("SkuId", "^SKU"),
            Predicate::any_of(vec![Predicate::regex("SkuMeter", "/Hour$")]),
        ]);
        assert_eq!(p.patterns(), vec!["^SKU", "/Hour$"]);
    }
}
