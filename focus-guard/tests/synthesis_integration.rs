//! Synthesized datasets validated against the catalogs they were built from.

use focus_guard::catalog::{CatalogRegistry, FocusVersion, Predicate, Rule, RuleCatalog};
use focus_guard::core::{ResultAggregator, RuleEvaluator};
use focus_guard::error::FocusError;
use focus_guard::synth::{DataSynthesizer, ReferenceValues, SynthesizerConfig};
use std::sync::Arc;

#[test]
fn test_synthesized_data_passes_every_builtin_catalog() {
    for version in FocusVersion::ALL {
        let catalog = CatalogRegistry::global().get(version).unwrap();
        let (dataset, conflicts) = DataSynthesizer::default()
            .generate(&catalog, 200, 7)
            .unwrap();
        assert!(!conflicts.has_unresolved(), "FOCUS {version}");
        assert!(conflicts.unsatisfied.is_empty(), "FOCUS {version}");

        let evaluator = RuleEvaluator::new(Arc::clone(&catalog)).unwrap();
        let outcomes = evaluator.evaluate(&dataset).unwrap();
        let report = ResultAggregator::reduce(&outcomes, &catalog);

        let failed: Vec<&str> = report.failed().map(|r| r.rule_id.as_str()).collect();
        assert!(failed.is_empty(), "FOCUS {version} failed rules: {failed:?}");
        assert_eq!(report.total_rows, 200);
        assert!(report.complete);
    }
}

#[test]
fn test_superseded_rules_are_reported_on_both_sides() {
    let catalog = CatalogRegistry::global().get(FocusVersion::V1_2).unwrap();
    let (dataset, conflicts) = DataSynthesizer::default()
        .generate(&catalog, 200, 42)
        .unwrap();

    let entry = conflicts.conflict("ListUnitPrice-C-006-O").unwrap();
    assert_eq!(entry.winner, "ListUnitPrice-C-005-C");
    assert_eq!(entry.column, "ListUnitPrice");
    assert!(!entry.unresolved);
    assert!(entry.rows > 0);

    let evaluator = RuleEvaluator::new(Arc::clone(&catalog)).unwrap();
    let report = ResultAggregator::reduce(&evaluator.evaluate(&dataset).unwrap(), &catalog);
    let loser = report.result("ListUnitPrice-C-006-O").unwrap();
    assert!(loser.is_passed());
    assert!(loser.conflict_count > 0);
}

#[test]
fn test_generation_is_deterministic() {
    let catalog = CatalogRegistry::global().default_catalog().unwrap();
    let synthesizer = DataSynthesizer::default();

    let (first, first_conflicts) = synthesizer.generate(&catalog, 1000, 42).unwrap();
    let (second, second_conflicts) = synthesizer.generate(&catalog, 1000, 42).unwrap();
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
    assert_eq!(first_conflicts, second_conflicts);

    let (other, _) = synthesizer.generate(&catalog, 1000, 43).unwrap();
    assert_ne!(first.fingerprint().unwrap(), other.fingerprint().unwrap());
}

#[test]
fn test_dataset_columns_follow_catalog() {
    let catalog = CatalogRegistry::global().get(FocusVersion::V1_0).unwrap();
    let (dataset, _) = DataSynthesizer::default().generate(&catalog, 3, 1).unwrap();

    assert_eq!(dataset.columns(), catalog.columns());
    let csv = String::from_utf8(dataset.to_csv().unwrap()).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.starts_with(&catalog.columns().join(",")));
}

#[test]
fn test_zero_rows() {
    let catalog = CatalogRegistry::global().default_catalog().unwrap();
    let (dataset, conflicts) = DataSynthesizer::default().generate(&catalog, 0, 42).unwrap();
    assert!(dataset.is_empty());
    assert!(conflicts.is_empty());
}

#[test]
fn test_cyclic_conditions_are_rejected() {
    let catalog = RuleCatalog::builder("1.2")
        .columns(["ChargeClass", "ChargeCategory"])
        .rule(Rule::conditional(
            "ChargeCategory-C-900-C",
            "ChargeCategory present when ChargeClass is",
            Predicate::not_null("ChargeClass"),
            Predicate::not_null("ChargeCategory"),
        ))
        .rule(Rule::conditional(
            "ChargeClass-C-900-C",
            "ChargeClass present when ChargeCategory is",
            Predicate::not_null("ChargeCategory"),
            Predicate::not_null("ChargeClass"),
        ))
        .build()
        .unwrap();

    let error = DataSynthesizer::default()
        .generate(&catalog, 10, 42)
        .unwrap_err();
    assert!(matches!(error, FocusError::CyclicConstraint { .. }));
}

#[test]
fn test_reference_values_flow_into_rows() {
    let catalog = CatalogRegistry::global().default_catalog().unwrap();
    let reference = ReferenceValues::default()
        .with_provider("Example Cloud")
        .with_currency("EUR");
    let synthesizer =
        DataSynthesizer::new(SynthesizerConfig::default().with_reference(reference));

    let (dataset, _) = synthesizer.generate(&catalog, 20, 42).unwrap();
    for row in dataset.rows() {
        assert_eq!(
            row.get("ProviderName").map(|v| v.to_string()),
            Some("Example Cloud".to_string())
        );
        assert_eq!(
            row.get("BillingCurrency").map(|v| v.to_string()),
            Some("EUR".to_string())
        );
    }
}

#[test]
fn test_self_gated_requirement_holds_after_synthesis() {
    let catalog = Arc::new(
        RuleCatalog::builder("1.2")
            .columns(["ChargeClass"])
            .rule(Rule::required(
                "ChargeClass-C-900-M",
                "ChargeClass must be present",
                "ChargeClass",
            ))
            .rule(Rule::conditional(
                "ChargeClass-C-901-C",
                "A present ChargeClass must be Adjustment",
                Predicate::not_null("ChargeClass"),
                Predicate::value("ChargeClass", "Adjustment"),
            ))
            .build()
            .unwrap(),
    );
    let (dataset, conflicts) = DataSynthesizer::default()
        .generate(&catalog, 3, 42)
        .unwrap();
    assert!(conflicts.is_empty());

    let report = RuleEvaluator::new(Arc::clone(&catalog))
        .unwrap()
        .validate(&dataset)
        .unwrap();
    assert_eq!(report.rules_failed, 0);
    assert!(report.result("ChargeClass-C-901-C").unwrap().is_passed());
}

#[test]
fn test_excluded_value_picks_another_allowed_value() {
    let catalog = Arc::new(
        RuleCatalog::builder("1.2")
            .columns(["BilledCost", "ChargeCategory"])
            .rule(Rule::conditional(
                "ChargeCategory-C-900-C",
                "Billed rows must be purchases",
                Predicate::not_null("BilledCost"),
                Predicate::all_of(vec![
                    Predicate::one_of("ChargeCategory", ["Usage", "Purchase"]),
                    Predicate::not_value("ChargeCategory", "Usage"),
                ]),
            ))
            .build()
            .unwrap(),
    );
    let (dataset, conflicts) = DataSynthesizer::default()
        .generate(&catalog, 5, 42)
        .unwrap();
    assert!(conflicts.is_empty());
    assert!(dataset.rows().iter().all(|row| {
        row.get("ChargeCategory").map(|v| v.to_string()) == Some("Purchase".to_string())
    }));

    let report = RuleEvaluator::new(Arc::clone(&catalog))
        .unwrap()
        .validate(&dataset)
        .unwrap();
    assert_eq!(report.rules_failed, 0);
}
