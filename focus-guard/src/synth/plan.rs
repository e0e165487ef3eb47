//! Column generation order.

use super::generators::derivation_dependencies;
use crate::catalog::RuleCatalog;
use crate::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// One column to generate, after every column it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisStep {
    pub column: String,
    pub depends_on: Vec<String>,
    /// Rules that constrain this column, in catalog order
    pub rule_ids: Vec<String>,
}

/// Topologically ordered generation steps for a catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisPlan {
    steps: Vec<SynthesisStep>,
    /// Column -> indices into the catalog's column constraints
    #[serde(skip)]
    constraints: HashMap<String, Vec<usize>>,
}

impl SynthesisPlan {
    /// Orders the catalog's columns with Kahn's algorithm.
    ///
    /// A column depends on the sources of its generator and on every column
    /// read by the condition of a rule constraining it. Ready columns are
    /// taken in catalog column order, so the plan is stable for a given
    /// catalog. A dependency cycle fails with
    /// [`FocusError::CyclicConstraint`] naming the columns left unplaced.
    pub fn build(catalog: &RuleCatalog) -> Result<Self> {
        let columns = catalog.columns();
        let position: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut depends_on: Vec<Vec<usize>> = vec![Vec::new(); columns.len()];
        let mut add_edge = |from: &str, to: &str| {
            if from == to {
                return;
            }
            if let (Some(&f), Some(&t)) = (position.get(from), position.get(to)) {
                if !depends_on[t].contains(&f) {
                    depends_on[t].push(f);
                }
            }
        };

        for column in columns {
            for &source in derivation_dependencies(column) {
                add_edge(source, column.as_str());
            }
        }

        let mut constraints: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, constraint) in catalog.constraints().iter().enumerate() {
            if let Some(condition) = &constraint.condition {
                for source in condition.columns() {
                    add_edge(source, constraint.column.as_str());
                }
            }
            constraints
                .entry(constraint.column.clone())
                .or_default()
                .push(index);
        }

        let mut indegree: Vec<usize> = depends_on.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); columns.len()];
        for (target, sources) in depends_on.iter().enumerate() {
            for &source in sources {
                dependents[source].push(target);
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(columns.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < columns.len() {
            let remaining: Vec<String> = (0..columns.len())
                .filter(|i| indegree[*i] > 0)
                .map(|i| columns[i].clone())
                .collect();
            return Err(FocusError::CyclicConstraint { columns: remaining });
        }

        let rules = catalog.rules();
        let steps: Vec<SynthesisStep> = order
            .into_iter()
            .map(|i| {
                let column = columns[i].clone();
                let mut sources = depends_on[i].clone();
                sources.sort_unstable();
                let mut rule_ids: Vec<String> = Vec::new();
                for &c in constraints.get(&column).map(Vec::as_slice).unwrap_or(&[]) {
                    let id = &rules[catalog.constraints()[c].rule_index].id;
                    if !rule_ids.contains(id) {
                        rule_ids.push(id.clone());
                    }
                }
                SynthesisStep {
                    column,
                    depends_on: sources.into_iter().map(|s| columns[s].clone()).collect(),
                    rule_ids,
                }
            })
            .collect();

        debug!(
            steps = steps.len(),
            constrained = constraints.len(),
            "Synthesis plan built"
        );
        Ok(Self { steps, constraints })
    }

    pub fn steps(&self) -> &[SynthesisStep] {
        &self.steps
    }

    /// Column names in generation order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.column.as_str())
    }

    pub fn step(&self, column: &str) -> Option<&SynthesisStep> {
        self.steps.iter().find(|s| s.column == column)
    }

    /// Indices into [`RuleCatalog::constraints`] for one column.
    pub fn constraints_for(&self, column: &str) -> &[usize] {
        self.constraints
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRegistry, FocusVersion, Predicate, Rule};

    fn position(plan: &SynthesisPlan, column: &str) -> usize {
        plan.columns().position(|c| c == column).unwrap()
    }

    #[test]
    fn test_conditions_order_columns() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["RegionName", "RegionId"])
            .rule(Rule::conditional(
                "RegionName-C-002-C",
                "RegionName present with RegionId",
                Predicate::not_null("RegionId"),
                Predicate::not_null("RegionName"),
            ))
            .build()
            .unwrap();

        let plan = SynthesisPlan::build(&catalog).unwrap();
        assert_eq!(plan.columns().collect::<Vec<_>>(), vec!["RegionId", "RegionName"]);
        let step = plan.step("RegionName").unwrap();
        assert_eq!(step.depends_on, vec!["RegionId".to_string()]);
        assert_eq!(step.rule_ids, vec!["RegionName-C-002-C".to_string()]);
    }

    #[test]
    fn test_ties_follow_catalog_order() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["SkuId", "BilledCost", "ChargeCategory"])
            .build()
            .unwrap();
        let plan = SynthesisPlan::build(&catalog).unwrap();
        assert_eq!(
            plan.columns().collect::<Vec<_>>(),
            vec!["SkuId", "BilledCost", "ChargeCategory"]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let catalog = RuleCatalog::builder("1.2")
            .columns(["ChargeClass", "ChargeCategory", "BilledCost"])
            .rule(Rule::conditional(
                "a",
                "a",
                Predicate::not_null("ChargeClass"),
                Predicate::not_null("ChargeCategory"),
            ))
            .rule(Rule::conditional(
                "b",
                "b",
                Predicate::not_null("ChargeCategory"),
                Predicate::not_null("ChargeClass"),
            ))
            .build()
            .unwrap();

        match SynthesisPlan::build(&catalog).unwrap_err() {
            FocusError::CyclicConstraint { columns } => {
                assert_eq!(columns, vec!["ChargeClass".to_string(), "ChargeCategory".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builtin_catalogs_are_acyclic() {
        for version in FocusVersion::ALL {
            let catalog = CatalogRegistry::global().get(version).unwrap();
            let plan = SynthesisPlan::build(&catalog).unwrap();
            assert_eq!(plan.len(), catalog.columns().len());
            assert!(position(&plan, "BilledCost") < position(&plan, "ListUnitPrice"));
            assert!(position(&plan, "ChargeCategory") < position(&plan, "ConsumedQuantity"));
        }
    }
}
