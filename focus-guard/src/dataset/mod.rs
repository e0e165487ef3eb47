//! In-memory columnar view of a cost-and-usage table.
//!
//! A [`Dataset`] is an ordered list of unique column names plus rows whose
//! values are optional [`Scalar`]s. Absent keys and explicit nulls are the
//! same thing to every predicate, and empty strings coming from the input
//! contract are normalized to null on the way in.
//!
//! ```rust
//! use focus_guard::dataset::Dataset;
//!
//! let dataset = Dataset::from_string_rows(
//!     vec!["BilledCost".to_string(), "ChargeCategory".to_string()],
//!     vec![
//!         vec!["12.5".to_string(), "Usage".to_string()],
//!         vec!["".to_string(), "Usage".to_string()],
//!     ],
//! )
//! .unwrap();
//!
//! assert_eq!(dataset.len(), 2);
//! assert!(dataset.rows()[1].get("BilledCost").is_none());
//! ```

mod interchange;
pub mod schema;

use crate::prelude::*;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Timestamp layout used when rendering and parsing FOCUS date-times.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A single typed or untyped cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Numeric value
    Number(f64),
    /// Point in time, always UTC
    Timestamp(DateTime<Utc>),
    /// Untyped value as it arrived from the input
    String(String),
}

impl Scalar {
    /// Converts an input-contract string into a scalar; empty means null.
    pub fn from_input(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else {
            Some(Scalar::String(raw.to_string()))
        }
    }

    /// Numeric view of the value, parsing strings when needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::String(s) => s.trim().parse::<f64>().ok(),
            Scalar::Timestamp(_) => None,
        }
    }

    /// Timestamp view of the value, parsing RFC 3339 or FOCUS layout strings.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Scalar::Timestamp(ts) => Some(*ts),
            Scalar::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                        .map(|naive| naive.and_utc())
                        .ok()
                }),
            Scalar::Number(_) => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Number(_) => "number",
            Scalar::Timestamp(_) => "timestamp",
            Scalar::String(_) => "string",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Scalar::Timestamp(value)
    }
}

/// Renders an optional value the way the report samples it: null is `""`.
pub fn render_value(value: Option<&Scalar>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

/// One record: column name to optional value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Option<Scalar>>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<Scalar>)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Value of a column; absent and null both yield `None`.
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.values.get(column).and_then(Option::as_ref)
    }

    /// Returns true if the column has no value.
    pub fn is_null(&self, column: &str) -> bool {
        self.get(column).is_none()
    }

    /// Sets (or clears) a column value.
    pub fn set(&mut self, column: impl Into<String>, value: Option<Scalar>) {
        self.values.insert(column.into(), value);
    }

    /// Builder-style [`Row::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.set(column, Some(value.into()));
        self
    }

    /// Builder-style explicit null.
    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.set(column, None);
        self
    }

    /// Column names present as keys (null or not).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Ordered columns plus ordered rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Creates an empty dataset with the given columns.
    ///
    /// Fails with a schema error if a column name repeats.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(columns.len());
        for (position, column) in columns.iter().enumerate() {
            if index.insert(column.clone(), position).is_some() {
                return Err(FocusError::schema_column(
                    column.clone(),
                    format!("duplicate column '{column}'"),
                ));
            }
        }
        Ok(Self {
            columns,
            index,
            rows: Vec::new(),
        })
    }

    /// Builds a dataset from string records in column order.
    ///
    /// Empty strings become null. Short records are padded with nulls;
    /// records longer than the header are rejected.
    pub fn from_string_rows(columns: Vec<String>, records: Vec<Vec<String>>) -> Result<Self> {
        let mut dataset = Self::new(columns)?;
        dataset.rows.reserve(records.len());
        for (row_index, record) in records.into_iter().enumerate() {
            if record.len() > dataset.columns.len() {
                return Err(FocusError::schema(format!(
                    "row {row_index} has {} values but only {} columns are defined",
                    record.len(),
                    dataset.columns.len()
                )));
            }
            let row = Row::from_pairs(
                dataset
                    .columns
                    .iter()
                    .zip(record.iter())
                    .map(|(column, raw)| (column.clone(), Scalar::from_input(raw))),
            );
            dataset.rows.push(row);
        }
        Ok(dataset)
    }

    /// Appends a row, rejecting keys outside the column set.
    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if let Some(unknown) = row.keys().find(|key| !self.index.contains_key(*key)) {
            return Err(FocusError::schema_column(
                unknown,
                format!("row key '{unknown}' is not a dataset column"),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Builder-style [`Dataset::push_row`].
    pub fn with_row(mut self, row: Row) -> Result<Self> {
        self.push_row(row)?;
        Ok(self)
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns true if the dataset declares the column.
    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// All rows in order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders a row as strings in column order, null as `""`.
    pub fn render_row(&self, row: &Row) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| render_value(row.get(column)))
            .collect()
    }
}
