//! Versioned rule catalogs.
//!
//! A [`RuleCatalog`] is an immutable, validated set of [`Rule`]s for one
//! FOCUS version. Catalogs are data: they are loaded from JSON documents
//! (the built-in ones ship with the crate, see [`CatalogRegistry`]) and
//! checked once at load time, so every later stage can assume that
//!
//! - rule ids are unique,
//! - every referenced column is declared,
//! - composite members exist and composites form no cycle,
//! - every regex compiles.
//!
//! Contradicting rule pairs are also indexed at load time (see
//! [`requirement`]); the evaluator and the synthesizer both consume that
//! index.
//!
//! ## Example
//!
//! ```rust
//! use focus_guard::catalog::{Predicate, Rule, RuleCatalog};
//!
//! let catalog = RuleCatalog::builder("1.2")
//!     .rule(Rule::required("BilledCost-C-001-M", "BilledCost present", "BilledCost"))
//!     .rule(Rule::conditional(
//!         "ConsumedQuantity-C-002-C",
//!         "Quantity present for usage",
//!         Predicate::value("ChargeCategory", "Usage"),
//!         Predicate::not_null("ConsumedQuantity"),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(catalog.len(), 2);
//! assert_eq!(catalog.columns(), &["BilledCost", "ChargeCategory", "ConsumedQuantity"]);
//! ```

pub mod registry;
pub mod requirement;
mod rule;

pub use registry::{supported_versions, CatalogRegistry, FocusVersion, SupportedVersions};
pub use requirement::{ColumnConstraint, Requirement, RuleConflict};
pub use rule::{CompositeMode, Predicate, Rule, RuleKind, Strictness};

use crate::dataset::schema::{canonical_position, is_known_column};
use crate::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, instrument};

/// On-disk shape of a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared columns, in generation tie-break order. Inferred when empty.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Columns a dataset must carry to be validated against this catalog.
    #[serde(default)]
    pub required_columns: Vec<String>,
    pub rules: Vec<Rule>,
}

/// Compiled regular expressions keyed by their source pattern.
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    patterns: HashMap<String, Regex>,
}

impl PatternCache {
    /// Compiles and stores `pattern` unless it is already cached.
    pub fn compile(&mut self, pattern: &str) -> Result<()> {
        if !self.patterns.contains_key(pattern) {
            let regex = Regex::new(pattern).map_err(|e| {
                FocusError::invalid_catalog(format!("invalid regex '{pattern}': {e}"))
            })?;
            self.patterns.insert(pattern.to_string(), regex);
        }
        Ok(())
    }

    pub fn get(&self, pattern: &str) -> Option<&Regex> {
        self.patterns.get(pattern)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// A validated, read-only rule catalog for one version.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    version: String,
    name: Option<String>,
    columns: Vec<String>,
    required_columns: Vec<String>,
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    patterns: PatternCache,
    composite_order: Vec<usize>,
    constraints: Vec<ColumnConstraint>,
    conflicts: Vec<RuleConflict>,
}

impl RuleCatalog {
    /// Starts building a catalog in code.
    pub fn builder(version: impl Into<String>) -> RuleCatalogBuilder {
        RuleCatalogBuilder::new(version)
    }

    /// Parses and validates a JSON catalog document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Reads and validates a JSON catalog from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_reader(reader)?;
        Self::from_document(document)
    }

    /// Loads a JSON catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Opening catalog {}", path.display()))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Validates a document and indexes it.
    #[instrument(skip(document), fields(version = %document.version, rules = document.rules.len()))]
    pub fn from_document(document: CatalogDocument) -> Result<Self> {
        let CatalogDocument {
            version,
            name,
            columns,
            required_columns,
            mut rules,
        } = document;

        if version.trim().is_empty() {
            return Err(FocusError::invalid_catalog("catalog version is empty"));
        }

        let columns = if columns.is_empty() {
            infer_columns(&rules)
        } else {
            columns
        };
        let declared = validate_columns(&columns, &required_columns)?;

        let mut index = HashMap::with_capacity(rules.len());
        for (position, rule) in rules.iter_mut().enumerate() {
            if index.insert(rule.id.clone(), position).is_some() {
                return Err(FocusError::invalid_catalog(format!(
                    "duplicate rule id '{}'",
                    rule.id
                )));
            }
            rule.version = version.clone();
        }

        let mut patterns = PatternCache::default();
        for rule in &rules {
            validate_rule(rule, &declared, &index)?;
            for predicate in rule.predicates() {
                for pattern in predicate.patterns() {
                    patterns.compile(pattern)?;
                }
            }
        }

        let composite_order = order_composites(&rules, &index)?;
        let constraints = requirement::column_constraints(&rules);
        let conflicts = requirement::detect_conflicts(&rules, &constraints);

        for conflict in &conflicts {
            debug!(
                column = %conflict.column,
                first = %rules[conflict.first].id,
                second = %rules[conflict.second].id,
                resolved = conflict.winner.is_some(),
                "Indexed contradicting rule pair"
            );
        }

        info!(
            catalog.version = %version,
            catalog.rules = rules.len(),
            catalog.columns = columns.len(),
            catalog.conflicts = conflicts.len(),
            "Loaded rule catalog"
        );

        Ok(Self {
            version,
            name,
            columns,
            required_columns,
            rules,
            index,
            patterns,
            composite_order,
            constraints,
            conflicts,
        })
    }

    /// Renders the catalog back into its document form.
    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument {
            version: self.version.clone(),
            name: self.name.clone(),
            columns: self.columns.clone(),
            required_columns: self.required_columns.clone(),
            rules: self.rules.clone(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared columns in catalog order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    /// Rules in catalog order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    pub fn rule_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    /// Indices of composite rules, members before the composites using them.
    pub fn composite_order(&self) -> &[usize] {
        &self.composite_order
    }

    /// Per-column requirements of every non-composite rule.
    pub fn constraints(&self) -> &[ColumnConstraint] {
        &self.constraints
    }

    /// Contradicting rule pairs found at load time.
    pub fn conflicts(&self) -> &[RuleConflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Builds a [`RuleCatalog`] in code; mostly useful for tests and embedding.
#[derive(Debug, Clone)]
pub struct RuleCatalogBuilder {
    document: CatalogDocument,
}

impl RuleCatalogBuilder {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            document: CatalogDocument {
                version: version.into(),
                name: None,
                columns: Vec::new(),
                required_columns: Vec::new(),
                rules: Vec::new(),
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.document.name = Some(name.into());
        self
    }

    /// Declares the columns explicitly instead of inferring them.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn required_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document.required_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.document.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.document.rules.extend(rules);
        self
    }

    pub fn build(self) -> Result<RuleCatalog> {
        RuleCatalog::from_document(self.document)
    }
}

/// Every column the rules reference, in canonical FOCUS order.
fn infer_columns(rules: &[Rule]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns: Vec<String> = rules
        .iter()
        .flat_map(Rule::referenced_columns)
        .filter(|c| seen.insert(c.to_string()))
        .map(str::to_string)
        .collect();
    columns.sort_by(|a, b| {
        canonical_position(a)
            .cmp(&canonical_position(b))
            .then_with(|| a.cmp(b))
    });
    columns
}

fn validate_columns<'a>(
    columns: &'a [String],
    required_columns: &[String],
) -> Result<HashSet<&'a str>> {
    let mut declared = HashSet::with_capacity(columns.len());
    for column in columns {
        if !is_known_column(column) {
            return Err(FocusError::schema_column(
                column.clone(),
                format!("'{column}' is not a FOCUS column"),
            ));
        }
        if !declared.insert(column.as_str()) {
            return Err(FocusError::schema_column(
                column.clone(),
                format!("column '{column}' is declared twice"),
            ));
        }
    }
    for column in required_columns {
        if !declared.contains(column.as_str()) {
            return Err(FocusError::schema_column(
                column.clone(),
                format!("required column '{column}' is not declared"),
            ));
        }
    }
    Ok(declared)
}

fn validate_rule(
    rule: &Rule,
    declared: &HashSet<&str>,
    index: &HashMap<String, usize>,
) -> Result<()> {
    match &rule.kind {
        RuleKind::Required | RuleKind::Forbidden if rule.column.is_none() => {
            return Err(FocusError::invalid_catalog(format!(
                "rule '{}' must name a column",
                rule.id
            )));
        }
        RuleKind::Composite { members, .. } => {
            if members.is_empty() {
                return Err(FocusError::invalid_catalog(format!(
                    "composite rule '{}' has no members",
                    rule.id
                )));
            }
            if let Some(missing) = members.iter().find(|m| !index.contains_key(m.as_str())) {
                return Err(FocusError::invalid_catalog(format!(
                    "composite rule '{}' references unknown rule '{missing}'",
                    rule.id
                )));
            }
        }
        _ => {}
    }

    for column in rule.referenced_columns() {
        if !declared.contains(column) {
            return Err(FocusError::schema_column(
                column,
                format!("rule '{}' references undeclared column '{column}'", rule.id),
            ));
        }
    }

    for predicate in rule.predicates() {
        check_ranges(&rule.id, predicate)?;
    }
    Ok(())
}

fn check_ranges(rule_id: &str, predicate: &Predicate) -> Result<()> {
    match predicate {
        Predicate::CheckRange {
            min: Some(min),
            max: Some(max),
            column,
        } if min > max => Err(FocusError::invalid_catalog(format!(
            "rule '{rule_id}' has an empty range on '{column}' ({min} > {max})"
        ))),
        Predicate::AllOf { predicates } | Predicate::AnyOf { predicates } => predicates
            .iter()
            .try_for_each(|p| check_ranges(rule_id, p)),
        _ => Ok(()),
    }
}

/// Orders composites so that composite members come first (Kahn's algorithm).
fn order_composites(rules: &[Rule], index: &HashMap<String, usize>) -> Result<Vec<usize>> {
    let composites: Vec<usize> = rules
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_composite())
        .map(|(i, _)| i)
        .collect();

    let mut in_degree: HashMap<usize, usize> = composites.iter().map(|&i| (i, 0)).collect();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();

    for &composite in &composites {
        if let RuleKind::Composite { members, .. } = &rules[composite].kind {
            for member in members {
                let Some(&member_index) = index.get(member) else {
                    continue;
                };
                if rules[member_index].is_composite() {
                    dependents.entry(member_index).or_default().push(composite);
                    *in_degree.entry(composite).or_insert(0) += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<usize> = composites
        .iter()
        .copied()
        .filter(|i| in_degree.get(i) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(composites.len());

    while let Some(current) = queue.pop_front() {
        order.push(current);
        if let Some(next) = dependents.get(&current) {
            for &dependent in next {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
    }

    if order.len() != composites.len() {
        let stuck: Vec<String> = composites
            .iter()
            .filter(|i| !order.contains(i))
            .map(|&i| rules[i].id.clone())
            .collect();
        return Err(FocusError::invalid_catalog(format!(
            "composite rules form a cycle: {}",
            stuck.join(", ")
        )));
    }
    Ok(order)
}
