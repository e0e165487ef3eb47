//! Renderings of a [`ValidationReport`].
//!
//! Three formatters share the [`ResultFormatter`] trait: JSON for machines,
//! a console rendering for people, and Markdown for reports checked into a
//! repository or posted on a pull request.
//!
//! # Examples
//!
//! ```rust
//! use focus_guard::core::ValidationReport;
//! use focus_guard::formatters::{FormatterConfig, HumanFormatter, ResultFormatter};
//!
//! let report = ValidationReport::from_results("1.2", 0, true, Vec::new());
//! let output = HumanFormatter::with_config(FormatterConfig::ci())
//!     .format(&report)
//!     .unwrap();
//! assert!(output.contains("Validation PASSED"));
//! ```

use crate::core::{CheckResult, CheckStatus, ValidationReport};
use crate::prelude::*;
use std::fmt::Write;

/// Configuration options for formatting reports.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the summary counts
    pub include_metrics: bool,
    /// Include failed rules
    pub include_failures: bool,
    /// Include passed and skipped rules as well
    pub include_passed: bool,
    /// Include the sample values of failed rules
    pub include_samples: bool,
    /// Maximum number of failed rules to display (-1 for all)
    pub max_failures: i32,
    /// Whether to use ANSI colors (human formatter)
    pub use_colors: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_metrics: true,
            include_failures: true,
            include_passed: false,
            include_samples: true,
            max_failures: -1,
            use_colors: true,
        }
    }
}

impl FormatterConfig {
    /// Summary only.
    pub fn minimal() -> Self {
        Self {
            include_metrics: true,
            include_failures: false,
            include_passed: false,
            include_samples: false,
            max_failures: 0,
            use_colors: false,
        }
    }

    /// Every rule, with samples.
    pub fn detailed() -> Self {
        Self {
            include_metrics: true,
            include_failures: true,
            include_passed: true,
            include_samples: true,
            max_failures: -1,
            use_colors: true,
        }
    }

    /// Bounded, uncolored output for CI logs.
    pub fn ci() -> Self {
        Self {
            include_metrics: true,
            include_failures: true,
            include_passed: false,
            include_samples: true,
            max_failures: 50,
            use_colors: false,
        }
    }

    pub fn with_metrics(mut self, include: bool) -> Self {
        self.include_metrics = include;
        self
    }

    pub fn with_failures(mut self, include: bool) -> Self {
        self.include_failures = include;
        self
    }

    pub fn with_passed(mut self, include: bool) -> Self {
        self.include_passed = include;
        self
    }

    pub fn with_samples(mut self, include: bool) -> Self {
        self.include_samples = include;
        self
    }

    pub fn with_max_failures(mut self, max: i32) -> Self {
        self.max_failures = max;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn failure_limit(&self, available: usize) -> usize {
        if self.max_failures < 0 {
            available
        } else {
            available.min(self.max_failures as usize)
        }
    }
}

/// Formats a validation report into a string.
///
/// # Examples
///
/// ```rust
/// use focus_guard::core::ValidationReport;
/// use focus_guard::formatters::ResultFormatter;
///
/// struct OneLine;
///
/// impl ResultFormatter for OneLine {
///     fn format(&self, report: &ValidationReport) -> focus_guard::prelude::Result<String> {
///         Ok(report.summary())
///     }
/// }
/// ```
pub trait ResultFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String>;

    /// Formats with explicit options; the default ignores them.
    fn format_with_config(
        &self,
        report: &ValidationReport,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(report)
    }
}

/// The report as JSON, filtered by the config.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(
        &self,
        report: &ValidationReport,
        config: &FormatterConfig,
    ) -> Result<String> {
        let filtered = filter_report(report, config);
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string(&filtered)
        };
        rendered.map_err(|e| FocusError::Serialization(format!("Failed to serialize report: {e}")))
    }
}

/// Console output with optional ANSI colors.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn paint(text: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("\x1b[{color}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn render_samples(samples: &[String]) -> String {
    samples
        .iter()
        .map(|s| format!("{s:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(
        &self,
        report: &ValidationReport,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        let colors = config.use_colors;

        writeln!(output).unwrap();
        if report.valid() {
            writeln!(output, "✅ {}", paint("Validation PASSED", "32", colors)).unwrap();
        } else {
            writeln!(output, "❌ {}", paint("Validation FAILED", "31", colors)).unwrap();
        }
        writeln!(output).unwrap();
        writeln!(output, "FOCUS version: {}", report.catalog_version).unwrap();
        writeln!(output, "{}", report.summary()).unwrap();

        if config.include_metrics {
            writeln!(output).unwrap();
            writeln!(output, "📊 Summary Statistics:").unwrap();
            writeln!(output, "   Rows: {}", report.total_rows).unwrap();
            writeln!(output, "   Rules Checked: {}", report.rules_checked).unwrap();
            writeln!(
                output,
                "   ✅ Passed: {}",
                paint(&report.rules_passed.to_string(), "32", colors)
            )
            .unwrap();
            writeln!(
                output,
                "   ❌ Failed: {}",
                paint(&report.rules_failed.to_string(), "31", colors)
            )
            .unwrap();
            writeln!(
                output,
                "   ⏭️  Skipped: {}",
                paint(&report.rules_skipped.to_string(), "33", colors)
            )
            .unwrap();
            writeln!(output, "   Success Rate: {:.1}%", report.success_rate()).unwrap();
            if !report.complete {
                writeln!(output, "   {}", paint("Incomplete run", "33", colors)).unwrap();
            }
        }

        let failed: Vec<&CheckResult> = report.failed().collect();
        if config.include_failures && !failed.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "🔍 Failed Rules:").unwrap();
            let shown = config.failure_limit(failed.len());
            for (i, result) in failed[..shown].iter().enumerate() {
                writeln!(output).unwrap();
                writeln!(
                    output,
                    "   {} #{}: {}",
                    paint("🚨", "31", colors),
                    i + 1,
                    result.rule_id
                )
                .unwrap();
                writeln!(output, "      Rule: {}", result.rule_name).unwrap();
                if let Some(column) = &result.column {
                    writeln!(output, "      Column: {column}").unwrap();
                }
                writeln!(output, "      Violations: {}", result.violation_count).unwrap();
                if let Some(message) = &result.error_message {
                    writeln!(output, "      Message: {message}").unwrap();
                }
                if config.include_samples && !result.sample_values.is_empty() {
                    writeln!(output, "      Samples: {}", render_samples(&result.sample_values))
                        .unwrap();
                }
            }
            if failed.len() > shown {
                writeln!(output).unwrap();
                writeln!(
                    output,
                    "   ... and {} more failed rules (raise max_failures to show more)",
                    failed.len() - shown
                )
                .unwrap();
            }
        }

        if config.include_passed {
            let others: Vec<&CheckResult> = report
                .results
                .iter()
                .filter(|r| r.status != CheckStatus::Failed)
                .collect();
            if !others.is_empty() {
                writeln!(output).unwrap();
                writeln!(output, "📋 Other Rules:").unwrap();
                for result in others {
                    let mark = match result.status {
                        CheckStatus::Passed => "✅",
                        _ => "⏭️ ",
                    };
                    if result.is_superseded() {
                        writeln!(
                            output,
                            "   {mark} {} ({} rows superseded)",
                            result.rule_id, result.conflict_count
                        )
                        .unwrap();
                        if let Some(detail) = &result.conflict {
                            writeln!(output, "      {detail}").unwrap();
                        }
                    } else {
                        writeln!(output, "   {mark} {}", result.rule_id).unwrap();
                    }
                }
            }
        }

        writeln!(output).unwrap();
        Ok(output)
    }
}

/// Markdown with a configurable heading level.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            heading_level: 2,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the top heading level, clamped to 1..=6.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

impl ResultFormatter for MarkdownFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(
        &self,
        report: &ValidationReport,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        let h = "#".repeat(self.heading_level as usize);

        if report.valid() {
            writeln!(output, "{h} ✅ FOCUS Validation Report - PASSED").unwrap();
        } else {
            writeln!(output, "{h} ❌ FOCUS Validation Report - FAILED").unwrap();
        }
        writeln!(output).unwrap();
        writeln!(output, "**Version:** {}", report.catalog_version).unwrap();
        writeln!(output).unwrap();
        writeln!(output, "> {}", report.summary()).unwrap();

        if config.include_metrics {
            writeln!(output).unwrap();
            writeln!(output, "{h}# Summary").unwrap();
            writeln!(output).unwrap();
            writeln!(output, "| Metric | Value |").unwrap();
            writeln!(output, "|--------|-------|").unwrap();
            writeln!(output, "| Rows | {} |", report.total_rows).unwrap();
            writeln!(output, "| Rules Checked | {} |", report.rules_checked).unwrap();
            writeln!(output, "| Passed | {} |", report.rules_passed).unwrap();
            writeln!(output, "| Failed | {} |", report.rules_failed).unwrap();
            writeln!(output, "| Skipped | {} |", report.rules_skipped).unwrap();
            writeln!(output, "| Success Rate | {:.1}% |", report.success_rate()).unwrap();
            writeln!(output, "| Complete | {} |", report.complete).unwrap();
        }

        let failed: Vec<&CheckResult> = report.failed().collect();
        if config.include_failures && !failed.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "{h}# Failed Rules").unwrap();
            writeln!(output).unwrap();
            let shown = config.failure_limit(failed.len());
            if config.include_samples {
                writeln!(output, "| Rule | Column | Violations | Message | Samples |").unwrap();
                writeln!(output, "|------|--------|------------|---------|---------|").unwrap();
            } else {
                writeln!(output, "| Rule | Column | Violations | Message |").unwrap();
                writeln!(output, "|------|--------|------------|---------|").unwrap();
            }
            for result in &failed[..shown] {
                let column = result.column.as_deref().unwrap_or("-");
                let message = escape_cell(result.error_message.as_deref().unwrap_or(""));
                if config.include_samples {
                    let samples = escape_cell(&render_samples(&result.sample_values));
                    writeln!(
                        output,
                        "| `{}` | {column} | {} | {message} | {samples} |",
                        result.rule_id, result.violation_count
                    )
                    .unwrap();
                } else {
                    writeln!(
                        output,
                        "| `{}` | {column} | {} | {message} |",
                        result.rule_id, result.violation_count
                    )
                    .unwrap();
                }
            }
            if failed.len() > shown {
                writeln!(output).unwrap();
                writeln!(
                    output,
                    "> **Note:** {} additional failed rules not shown in this report.",
                    failed.len() - shown
                )
                .unwrap();
            }
        }

        if config.include_passed {
            writeln!(output).unwrap();
            writeln!(output, "{h}# All Rules").unwrap();
            writeln!(output).unwrap();
            writeln!(output, "| Rule | Status | Violations | Superseded |").unwrap();
            writeln!(output, "|------|--------|------------|------------|").unwrap();
            for result in &report.results {
                writeln!(
                    output,
                    "| `{}` | {:?} | {} | {} |",
                    result.rule_id, result.status, result.violation_count, result.conflict_count
                )
                .unwrap();
            }
        }

        Ok(output)
    }
}

/// Drops the parts of a report the config excludes.
fn filter_report(report: &ValidationReport, config: &FormatterConfig) -> ValidationReport {
    let mut filtered = report.clone();
    let mut failures_left = if config.include_failures {
        config.failure_limit(report.rules_failed)
    } else {
        0
    };
    filtered.results.retain(|result| {
        if result.is_failed() {
            if failures_left == 0 {
                return false;
            }
            failures_left -= 1;
            true
        } else {
            config.include_passed
        }
    });
    if !config.include_samples {
        for result in &mut filtered.results {
            result.sample_values.clear();
        }
    }
    filtered
}
