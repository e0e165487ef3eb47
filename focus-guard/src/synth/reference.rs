//! Reference pools the column generators draw from.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A cloud service with its FOCUS category and subcategory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub name: String,
    pub category: String,
    pub subcategory: String,
}

impl ServiceRef {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            subcategory: subcategory.into(),
        }
    }
}

/// A region id and its display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRef {
    pub id: String,
    pub name: String,
}

impl RegionRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An account as it appears in the billing and sub-account columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: String,
    pub name: String,
    pub account_type: String,
}

impl AccountRef {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        account_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            account_type: account_type.into(),
        }
    }
}

const SEPTEMBER_2024: i64 = 1_725_148_800;
const OCTOBER_2024: i64 = 1_727_740_800;

fn utc_seconds(seconds: i64) -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + TimeDelta::seconds(seconds)
}

/// Values a synthesis run draws from.
///
/// The defaults describe a single AWS payer account with one linked
/// account, billed in USD over September 2024.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValues {
    pub provider: String,
    pub currency: String,
    pub services: Vec<ServiceRef>,
    pub regions: Vec<RegionRef>,
    pub units: Vec<String>,
    pub pricing_categories: Vec<String>,
    pub billing_account: AccountRef,
    pub sub_account: AccountRef,
    pub billing_period_start: DateTime<Utc>,
    pub billing_period_end: DateTime<Utc>,
}

impl Default for ReferenceValues {
    fn default() -> Self {
        Self {
            provider: "Amazon Web Services".to_string(),
            currency: "USD".to_string(),
            services: vec![
                ServiceRef::new("Amazon Elastic Compute Cloud", "Compute", "Virtual Machines"),
                ServiceRef::new("Amazon Simple Storage Service", "Storage", "Object Storage"),
                ServiceRef::new("Amazon Relational Database Service", "Databases", "Relational"),
                ServiceRef::new("AWS Lambda", "Compute", "Serverless"),
                ServiceRef::new("Amazon DynamoDB", "Databases", "NoSQL"),
                ServiceRef::new("Amazon CloudFront", "Networking", "CDN"),
                ServiceRef::new("Amazon VPC", "Networking", "Virtual Network"),
                ServiceRef::new("Amazon EKS", "Compute", "Containers"),
            ],
            regions: vec![
                RegionRef::new("us-east-1", "US East (N. Virginia)"),
                RegionRef::new("us-west-2", "US West (Oregon)"),
                RegionRef::new("eu-west-1", "Europe (Ireland)"),
                RegionRef::new("ap-southeast-1", "Asia Pacific (Singapore)"),
            ],
            units: ["Hours", "GB", "Requests", "Units"]
                .into_iter()
                .map(String::from)
                .collect(),
            pricing_categories: ["Standard", "Dynamic"]
                .into_iter()
                .map(String::from)
                .collect(),
            billing_account: AccountRef::new("123456789012", "Main Account", "Consolidated"),
            sub_account: AccountRef::new("987654321098", "Development", "Linked"),
            billing_period_start: utc_seconds(SEPTEMBER_2024),
            billing_period_end: utc_seconds(OCTOBER_2024),
        }
    }
}

impl ReferenceValues {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_services(mut self, services: Vec<ServiceRef>) -> Self {
        self.services = services;
        self
    }

    pub fn with_regions(mut self, regions: Vec<RegionRef>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_billing_period(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.billing_period_start = start;
        self.billing_period_end = end;
        self
    }

    /// Length of the billing period in whole seconds.
    pub fn billing_period_seconds(&self) -> i64 {
        (self.billing_period_end - self.billing_period_start).num_seconds()
    }

    /// Returns a description of the first problem that would make the pools
    /// unusable, if any.
    pub(crate) fn problem(&self) -> Option<String> {
        if self.services.is_empty() {
            return Some("reference services must not be empty".to_string());
        }
        if self.regions.is_empty() {
            return Some("reference regions must not be empty".to_string());
        }
        if self.units.is_empty() {
            return Some("reference units must not be empty".to_string());
        }
        if self.pricing_categories.is_empty() {
            return Some("reference pricing categories must not be empty".to_string());
        }
        if self.billing_period_seconds() < 3600 {
            return Some("billing period must span at least one hour".to_string());
        }
        None
    }
}
