//! Built-in column generators.
//!
//! Every FOCUS column has a natural value for a usage row. Some of them are
//! derived from other columns of the same row (unit prices from cost and
//! quantity, region names from region ids); [`derivation_dependencies`]
//! lists those edges so the plan can order columns accordingly. A derived
//! generator reads the partially built row and falls back to the row's base
//! draw when the source column is not part of the catalog.

use super::reference::{RegionRef, ReferenceValues, ServiceRef};
use crate::dataset::{Row, Scalar, TIMESTAMP_FORMAT};
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashSet;

/// Columns whose values feed a column's natural value.
pub fn derivation_dependencies(column: &str) -> &'static [&'static str] {
    match column {
        "AvailabilityZone" | "RegionName" => &["RegionId"],
        "ResourceId" => &["RegionId"],
        "ChargePeriodEnd" => &["ChargePeriodStart"],
        "ChargeDescription" | "ServiceCategory" | "ServiceSubcategory" => &["ServiceName"],
        "ResourceType" => &["ServiceCategory"],
        "ListCost" | "EffectiveCost" | "ContractedCost" => &["BilledCost"],
        "ListUnitPrice" | "ContractedUnitPrice" => &["BilledCost", "PricingQuantity"],
        "PricingQuantity" => &["ConsumedQuantity"],
        "PricingUnit" | "SkuMeter" => &["ConsumedUnit"],
        "SkuPriceId" => &["SkuId"],
        "PricingCurrencyListUnitPrice" => &["ListUnitPrice"],
        "PricingCurrencyContractedUnitPrice" => &["ContractedUnitPrice"],
        "PricingCurrencyEffectiveCost" => &["EffectiveCost"],
        _ => &[],
    }
}

/// Random values drawn once per row, in a fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseDraw {
    pub service: usize,
    pub region: usize,
    /// Seconds from the billing period start to the charge period start
    pub charge_offset: i64,
    pub billed_cost: f64,
    pub consumed_quantity: f64,
    pub unit: usize,
    pub pricing_category: usize,
}

impl BaseDraw {
    pub fn draw(rng: &mut StdRng, reference: &ReferenceValues) -> Self {
        let service = rng.random_range(0..reference.services.len());
        let region = rng.random_range(0..reference.regions.len());
        let charge_offset = rng.random_range(0..=reference.billing_period_seconds() - 3600);
        let billed_cost = round6(rng.random_range(0.01..100.0));
        let consumed_quantity = round6(rng.random_range(0.001..100.0));
        let unit = rng.random_range(0..reference.units.len());
        let pricing_category = rng.random_range(0..reference.pricing_categories.len());
        Self {
            service,
            region,
            charge_offset,
            billed_cost,
            consumed_quantity,
            unit,
            pricing_category,
        }
    }
}

/// Rounds to six decimal places.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

pub fn format_amount(value: f64) -> String {
    format!("{}", round6(value))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Everything a generator may look at for one row.
pub struct GeneratorContext<'a> {
    pub reference: &'a ReferenceValues,
    /// Columns the catalog generates
    pub columns: &'a HashSet<String>,
    pub row_index: usize,
    pub draw: &'a BaseDraw,
}

impl GeneratorContext<'_> {
    fn generated(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    fn number(&self, row: &Row, column: &str) -> Option<f64> {
        if self.generated(column) {
            row.get(column).and_then(|v| v.as_f64())
        } else {
            None
        }
    }

    fn text(&self, row: &Row, column: &str) -> Option<String> {
        if self.generated(column) {
            row.get(column).map(ToString::to_string)
        } else {
            None
        }
    }

    fn timestamp(&self, row: &Row, column: &str) -> Option<DateTime<Utc>> {
        if self.generated(column) {
            row.get(column).and_then(Scalar::as_timestamp)
        } else {
            None
        }
    }

    fn service(&self, row: &Row) -> &ServiceRef {
        let drawn = &self.reference.services[self.draw.service];
        match self.text(row, "ServiceName") {
            Some(name) => self
                .reference
                .services
                .iter()
                .find(|s| s.name == name)
                .unwrap_or(drawn),
            None => drawn,
        }
    }

    fn region(&self, row: &Row) -> RegionRef {
        let drawn = &self.reference.regions[self.draw.region];
        match self.text(row, "RegionId") {
            Some(id) => self
                .reference
                .regions
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .unwrap_or_else(|| RegionRef::new(id.clone(), id)),
            None => drawn.clone(),
        }
    }

    fn billed_cost(&self, row: &Row) -> f64 {
        self.number(row, "BilledCost")
            .unwrap_or(self.draw.billed_cost)
    }

    fn pricing_quantity(&self, row: &Row) -> f64 {
        self.number(row, "PricingQuantity")
            .unwrap_or(self.draw.consumed_quantity)
    }

    fn unit(&self, row: &Row) -> String {
        self.text(row, "ConsumedUnit")
            .unwrap_or_else(|| self.reference.units[self.draw.unit].clone())
    }

    fn unit_price(&self, row: &Row) -> f64 {
        round6(self.billed_cost(row) / self.pricing_quantity(row).max(0.001))
    }

    fn charge_start(&self) -> DateTime<Utc> {
        self.reference.billing_period_start + TimeDelta::seconds(self.draw.charge_offset)
    }

    /// Copies a generated column, or computes the value when it is not generated.
    fn mirror(&self, row: &Row, column: &str, compute: impl FnOnce() -> String) -> Option<String> {
        if self.generated(column) {
            row.get(column).map(ToString::to_string)
        } else {
            Some(compute())
        }
    }
}

/// The value a usage row carries for `column` absent any rule.
pub fn natural_value(column: &str, row: &Row, ctx: &GeneratorContext<'_>) -> Option<String> {
    let reference = ctx.reference;
    let row_index = ctx.row_index;
    let value = match column {
        "AvailabilityZone" => format!("{}a", ctx.region(row).id),
        "BilledCost" => format_amount(ctx.draw.billed_cost),
        "BillingAccountId" => reference.billing_account.id.clone(),
        "BillingAccountName" => reference.billing_account.name.clone(),
        "BillingAccountType" => reference.billing_account.account_type.clone(),
        "BillingCurrency" | "PricingCurrency" => reference.currency.clone(),
        "BillingPeriodStart" => format_timestamp(reference.billing_period_start),
        "BillingPeriodEnd" => format_timestamp(reference.billing_period_end),
        "ChargeCategory" => "Usage".to_string(),
        "ChargeDescription" => format!("Usage charge for {}", ctx.service(row).name),
        "ChargeFrequency" => "Usage-Based".to_string(),
        "ChargePeriodStart" => format_timestamp(ctx.charge_start()),
        "ChargePeriodEnd" => {
            let start = ctx
                .timestamp(row, "ChargePeriodStart")
                .unwrap_or_else(|| ctx.charge_start());
            format_timestamp(start + TimeDelta::hours(1))
        }
        "ConsumedQuantity" => format_amount(ctx.draw.consumed_quantity),
        "ConsumedUnit" => reference.units[ctx.draw.unit].clone(),
        "ContractedCost" | "EffectiveCost" | "ListCost" => format_amount(ctx.billed_cost(row)),
        "ContractedUnitPrice" | "ListUnitPrice" => format_amount(ctx.unit_price(row)),
        "InvoiceId" => format!(
            "INV-{}-{row_index:06}",
            reference.billing_period_start.year()
        ),
        "InvoiceIssuerName" | "ProviderName" | "PublisherName" => reference.provider.clone(),
        "PricingCategory" => reference.pricing_categories[ctx.draw.pricing_category].clone(),
        "PricingQuantity" => format_amount(
            ctx.number(row, "ConsumedQuantity")
                .unwrap_or(ctx.draw.consumed_quantity),
        ),
        "PricingUnit" => ctx.unit(row),
        "PricingCurrencyListUnitPrice" => {
            return ctx.mirror(row, "ListUnitPrice", || format_amount(ctx.unit_price(row)))
        }
        "PricingCurrencyContractedUnitPrice" => {
            return ctx.mirror(row, "ContractedUnitPrice", || {
                format_amount(ctx.unit_price(row))
            })
        }
        "PricingCurrencyEffectiveCost" => {
            return ctx.mirror(row, "EffectiveCost", || format_amount(ctx.billed_cost(row)))
        }
        "RegionId" => reference.regions[ctx.draw.region].id.clone(),
        "RegionName" => ctx.region(row).name,
        "ResourceId" => format!(
            "arn:aws:ec2:{}:{}:instance/i-{row_index:08x}",
            ctx.region(row).id,
            reference.billing_account.id
        ),
        "ResourceName" => format!("Resource-{row_index}"),
        "ResourceType" => {
            let category = ctx
                .text(row, "ServiceCategory")
                .unwrap_or_else(|| ctx.service(row).category.clone());
            if category == "Compute" {
                "Compute Instance".to_string()
            } else {
                "Storage Volume".to_string()
            }
        }
        "ServiceName" => reference.services[ctx.draw.service].name.clone(),
        "ServiceCategory" => ctx.service(row).category.clone(),
        "ServiceSubcategory" => ctx.service(row).subcategory.clone(),
        "SkuId" => format!("SKU{row_index:06}"),
        "SkuPriceId" => {
            return ctx.mirror(row, "SkuId", || format!("SKU{row_index:06}"));
        }
        "SkuMeter" => format!("{}/Hour", ctx.unit(row)),
        "SubAccountId" => reference.sub_account.id.clone(),
        "SubAccountName" => reference.sub_account.name.clone(),
        "SubAccountType" => reference.sub_account.account_type.clone(),
        _ => return None,
    };
    Some(value)
}

/// A plausible value for a column a rule requires but the usage row
/// leaves empty.
pub fn fallback_value(column: &str, row: &Row, ctx: &GeneratorContext<'_>) -> String {
    if let Some(value) = natural_value(column, row, ctx) {
        return value;
    }
    let row_index = ctx.row_index;
    match column {
        "ChargeClass" => "Correction".to_string(),
        "Tags" | "SkuPriceDetails" => "{}".to_string(),
        "CommitmentDiscountId" => format!("cd-{row_index:08x}"),
        "CommitmentDiscountName" => format!("Commitment-{row_index}"),
        "CommitmentDiscountCategory" => "Usage".to_string(),
        "CommitmentDiscountType" => "Reserved".to_string(),
        "CommitmentDiscountStatus" | "CapacityReservationStatus" => "Used".to_string(),
        "CommitmentDiscountQuantity" => format_amount(ctx.draw.consumed_quantity),
        "CommitmentDiscountUnit" => ctx.unit(row),
        "CapacityReservationId" => format!("cr-{row_index:08x}"),
        _ => format!("{column}-{row_index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn context<'a>(
        reference: &'a ReferenceValues,
        columns: &'a HashSet<String>,
        draw: &'a BaseDraw,
    ) -> GeneratorContext<'a> {
        GeneratorContext {
            reference,
            columns,
            row_index: 7,
            draw,
        }
    }

    fn fixed_draw() -> BaseDraw {
        BaseDraw {
            service: 0,
            region: 1,
            charge_offset: 3600,
            billed_cost: 10.0,
            consumed_quantity: 4.0,
            unit: 0,
            pricing_category: 1,
        }
    }

    #[test]
    fn test_draws_stay_in_range() {
        let reference = ReferenceValues::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let draw = BaseDraw::draw(&mut rng, &reference);
            assert!(draw.service < reference.services.len());
            assert!((0.01..=100.0).contains(&draw.billed_cost));
            assert!((0.001..=100.0).contains(&draw.consumed_quantity));
            assert!(draw.charge_offset <= reference.billing_period_seconds() - 3600);
        }
    }

    #[test]
    fn test_unit_price_reads_the_row() {
        let reference = ReferenceValues::default();
        let columns: HashSet<String> = ["BilledCost", "PricingQuantity"]
            .into_iter()
            .map(String::from)
            .collect();
        let draw = fixed_draw();
        let ctx = context(&reference, &columns, &draw);

        let row = Row::new()
            .with("BilledCost", "9")
            .with("PricingQuantity", "3");
        assert_eq!(natural_value("ListUnitPrice", &row, &ctx).as_deref(), Some("3"));

        // Falls back to the base draw when the source column is empty.
        let empty = Row::new();
        assert_eq!(natural_value("ListUnitPrice", &empty, &ctx).as_deref(), Some("2.5"));
    }

    #[test]
    fn test_identifiers_and_periods() {
        let reference = ReferenceValues::default();
        let columns = HashSet::new();
        let draw = fixed_draw();
        let ctx = context(&reference, &columns, &draw);
        let row = Row::new();

        assert_eq!(natural_value("SkuId", &row, &ctx).as_deref(), Some("SKU000007"));
        assert_eq!(
            natural_value("InvoiceId", &row, &ctx).as_deref(),
            Some("INV-2024-000007")
        );
        assert_eq!(
            natural_value("ResourceId", &row, &ctx).as_deref(),
            Some("arn:aws:ec2:us-west-2:123456789012:instance/i-00000007")
        );
        assert_eq!(
            natural_value("ChargePeriodStart", &row, &ctx).as_deref(),
            Some("2024-09-01T01:00:00Z")
        );
        assert_eq!(
            natural_value("ChargePeriodEnd", &row, &ctx).as_deref(),
            Some("2024-09-01T02:00:00Z")
        );
        assert_eq!(natural_value("ChargeClass", &row, &ctx), None);
        assert_eq!(fallback_value("ChargeClass", &row, &ctx), "Correction");
    }

    #[test]
    fn test_region_name_follows_region_id() {
        let reference = ReferenceValues::default();
        let columns: HashSet<String> = ["RegionId".to_string()].into_iter().collect();
        let draw = fixed_draw();
        let ctx = context(&reference, &columns, &draw);

        let row = Row::new().with("RegionId", "eu-west-1");
        assert_eq!(
            natural_value("RegionName", &row, &ctx).as_deref(),
            Some("Europe (Ireland)")
        );
        assert_eq!(
            natural_value("AvailabilityZone", &row, &ctx).as_deref(),
            Some("eu-west-1a")
        );
    }

    #[test]
    fn test_round6() {
        assert_eq!(round6(1.23456789), 1.234568);
        assert_eq!(format_amount(2.0), "2");
    }
}
