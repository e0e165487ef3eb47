//! Single-row predicate evaluation.

use crate::catalog::{PatternCache, Predicate};
use crate::dataset::{Row, Scalar};
use regex::Regex;
use std::borrow::Cow;
use std::fmt;

/// A predicate that could not be applied to the value it found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub column: String,
    pub expected: &'static str,
    pub found: String,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' expected {}, found '{}'",
            self.column, self.expected, self.found
        )
    }
}

impl std::error::Error for TypeMismatch {}

fn equals(value: &Scalar, expected: &str) -> bool {
    match value {
        Scalar::Number(n) => expected
            .trim()
            .parse::<f64>()
            .map(|e| e == *n)
            .unwrap_or(false),
        other => other.to_string() == expected,
    }
}

impl Predicate {
    /// Evaluates the predicate against one row.
    ///
    /// Absent and null columns are "no value": value, membership, range and
    /// regex checks are false on them while `CheckNotValue` is true. A value
    /// of the wrong type for the check yields a [`TypeMismatch`].
    pub fn evaluate(
        &self,
        row: &Row,
        patterns: &PatternCache,
    ) -> std::result::Result<bool, TypeMismatch> {
        match self {
            Predicate::CheckValue { column, value } => {
                Ok(row.get(column).is_some_and(|v| equals(v, value)))
            }
            Predicate::CheckNotValue { column, value } => {
                Ok(!row.get(column).is_some_and(|v| equals(v, value)))
            }
            Predicate::CheckNull { column } => Ok(row.is_null(column)),
            Predicate::CheckNotNull { column } => Ok(!row.is_null(column)),
            Predicate::CheckIn { column, values } => Ok(row
                .get(column)
                .is_some_and(|v| values.iter().any(|expected| equals(v, expected)))),
            Predicate::CheckRange { column, min, max } => {
                let Some(value) = row.get(column) else {
                    return Ok(false);
                };
                let number = value.as_f64().ok_or_else(|| TypeMismatch {
                    column: column.clone(),
                    expected: "a number",
                    found: value.to_string(),
                })?;
                Ok(min.map_or(true, |m| number >= m) && max.map_or(true, |m| number <= m))
            }
            Predicate::CheckRegex { column, pattern } => {
                let Some(value) = row.get(column) else {
                    return Ok(false);
                };
                let regex = match patterns.get(pattern) {
                    Some(regex) => Cow::Borrowed(regex),
                    None => Cow::Owned(Regex::new(pattern).map_err(|_| TypeMismatch {
                        column: column.clone(),
                        expected: "a valid pattern",
                        found: pattern.clone(),
                    })?),
                };
                Ok(regex.is_match(&value.to_string()))
            }
            Predicate::AllOf { predicates } => {
                for predicate in predicates {
                    if !predicate.evaluate(row, patterns)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::AnyOf { predicates } => {
                let mut first_error = None;
                for predicate in predicates {
                    match predicate.evaluate(row, patterns) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                first_error.map_or(Ok(false), Err)
            }
        }
    }

    /// Like [`Predicate::evaluate`], treating a type mismatch as "does not hold".
    pub fn holds(&self, row: &Row, patterns: &PatternCache) -> bool {
        self.evaluate(row, patterns).unwrap_or(false)
    }
}

fn join(predicates: &[Predicate], separator: &str) -> String {
    predicates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::CheckValue { column, value } => write!(f, "{column} = '{value}'"),
            Predicate::CheckNotValue { column, value } => write!(f, "{column} != '{value}'"),
            Predicate::CheckNull { column } => write!(f, "{column} IS NULL"),
            Predicate::CheckNotNull { column } => write!(f, "{column} IS NOT NULL"),
            Predicate::CheckRange { column, min, max } => match (min, max) {
                (Some(min), Some(max)) => write!(f, "{column} BETWEEN {min} AND {max}"),
                (Some(min), None) => write!(f, "{column} >= {min}"),
                (None, Some(max)) => write!(f, "{column} <= {max}"),
                (None, None) => write!(f, "{column} IS NUMERIC"),
            },
            Predicate::CheckRegex { column, pattern } => write!(f, "{column} MATCHES /{pattern}/"),
            Predicate::CheckIn { column, values } => {
                let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
                write!(f, "{column} IN ({})", quoted.join(", "))
            }
            Predicate::AllOf { predicates } => write!(f, "({})", join(predicates, " AND ")),
            Predicate::AnyOf { predicates } => write!(f, "({})", join(predicates, " OR ")),
        }
    }
}
