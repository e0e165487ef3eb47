//! Prelude for commonly used types and traits in focus-guard.

pub use crate::catalog::{CatalogRegistry, FocusVersion, Rule, RuleCatalog};
pub use crate::core::{RuleEvaluator, ValidationReport, ValidationResponse, ValidationRunner};
pub use crate::dataset::{Dataset, Row, Scalar};
pub use crate::error::{ErrorContext, FocusError, Result};
pub use crate::formatters::{FormatterConfig, ResultFormatter};
pub use crate::logging::LogConfig;
pub use crate::synth::DataSynthesizer;
