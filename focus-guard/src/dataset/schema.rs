//! The closed set of FOCUS cost-and-usage column names.

/// Every column name a FOCUS catalog may reference, in canonical order.
pub const FOCUS_COLUMNS: &[&str] = &[
    // Core usage
    "AvailabilityZone",
    "BilledCost",
    "BillingAccountId",
    "BillingAccountName",
    "BillingAccountType",
    "BillingCurrency",
    "BillingPeriodEnd",
    "BillingPeriodStart",
    "ChargeCategory",
    "ChargeClass",
    "ChargeDescription",
    "ChargeFrequency",
    "ChargePeriodEnd",
    "ChargePeriodStart",
    "ConsumedQuantity",
    "ConsumedUnit",
    "ContractedCost",
    "ContractedUnitPrice",
    "EffectiveCost",
    "InvoiceIssuerName",
    "ListCost",
    "ListUnitPrice",
    "PricingCategory",
    "PricingCurrency",
    "PricingQuantity",
    "PricingUnit",
    "ProviderName",
    "PublisherName",
    "RegionId",
    "RegionName",
    "ResourceId",
    "ResourceName",
    "ResourceType",
    "ServiceCategory",
    "ServiceName",
    "ServiceSubcategory",
    "SkuId",
    "SkuPriceId",
    "SubAccountId",
    "SubAccountName",
    "SubAccountType",
    // Commitment discounts
    "CommitmentDiscountCategory",
    "CommitmentDiscountId",
    "CommitmentDiscountName",
    "CommitmentDiscountQuantity",
    "CommitmentDiscountStatus",
    "CommitmentDiscountType",
    "CommitmentDiscountUnit",
    // Capacity reservations
    "CapacityReservationId",
    "CapacityReservationStatus",
    // Invoice
    "InvoiceId",
    // SKU detail
    "SkuMeter",
    "SkuPriceDetails",
    // Tags
    "Tags",
    // Pricing currency variants
    "PricingCurrencyContractedUnitPrice",
    "PricingCurrencyEffectiveCost",
    "PricingCurrencyListUnitPrice",
];

/// Prefix FOCUS reserves for provider-specific custom columns.
pub const CUSTOM_COLUMN_PREFIX: &str = "x_";

/// Returns true if `name` is a FOCUS column or a custom `x_` column.
pub fn is_known_column(name: &str) -> bool {
    name.starts_with(CUSTOM_COLUMN_PREFIX) || FOCUS_COLUMNS.contains(&name)
}

/// Position of a column in the canonical order, custom columns last.
pub fn canonical_position(name: &str) -> usize {
    FOCUS_COLUMNS
        .iter()
        .position(|c| *c == name)
        .unwrap_or(FOCUS_COLUMNS.len())
}
