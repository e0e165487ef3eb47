//! Logging configuration for focus-guard.
//!
//! Per-row logging is the hot path of a validation run: a 10k-row dataset
//! against a 70-rule catalog produces 700k outcomes. [`LogConfig`] and the
//! macros below keep that logging off unless it is asked for.

use tracing::Level;

/// Logging configuration for the evaluator and synthesizer.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for focus-guard components
    pub base_level: Level,
    /// Whether to log every per-row rule verdict
    pub log_rule_details: bool,
    /// Whether to log dataset operations (conversion, generation)
    pub log_data_operations: bool,
    /// Maximum length for logged field values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_rule_details: false,
            log_data_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything on, for debugging a catalog.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_rule_details: true,
            log_data_operations: true,
            max_field_length: 1024,
        }
    }

    /// Lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_rule_details: false,
            log_data_operations: false,
            max_field_length: 128,
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }

    pub fn with_rule_details(mut self, enabled: bool) -> Self {
        self.log_rule_details = enabled;
        self
    }

    pub fn with_data_operations(mut self, enabled: bool) -> Self {
        self.log_data_operations = enabled;
        self
    }

    pub fn with_max_field_length(mut self, max_field_length: usize) -> Self {
        self.max_field_length = max_field_length;
        self
    }

    /// Truncates a value to this configuration's field length.
    pub fn field(&self, value: &str) -> String {
        truncate_field(value, self.max_field_length)
    }
}

/// Debug logging that skips argument evaluation above DEBUG.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Per-row rule verdict logging.
#[macro_export]
macro_rules! log_rule {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_rule_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Dataset operation logging.
#[macro_export]
macro_rules! log_data_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_data_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` bytes, on a char boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber setup for binaries and tests.
pub mod setup {
    use tracing::Level;

    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything else
        pub level: Level,
        /// Log level for focus-guard components
        pub focus_level: Level,
        pub json_format: bool,
        /// Write to stderr instead of stdout
        pub stderr: bool,
        /// Overrides the generated filter
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                focus_level: Level::DEBUG,
                json_format: false,
                stderr: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                focus_level: Level::INFO,
                json_format: true,
                stderr: false,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                focus_level: Level::DEBUG,
                json_format: false,
                stderr: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_focus_level(mut self, level: Level) -> Self {
            self.focus_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sends log output to stderr, leaving stdout for data.
        pub fn with_stderr(mut self, enabled: bool) -> Self {
            self.stderr = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},focus_guard={}",
                    self.level.as_str().to_lowercase(),
                    self.focus_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global subscriber; `RUST_LOG` wins over the config.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use focus_guard::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = match (config.json_format, config.stderr) {
            (true, true) => tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed(),
            (true, false) => tracing_subscriber::fmt::layer().json().boxed(),
            (false, true) => tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed(),
            (false, false) => tracing_subscriber::fmt::layer().boxed(),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_presets() {
        let config = LogConfig::default();
        assert_eq!(config.base_level, Level::INFO);
        assert!(!config.log_rule_details);
        assert!(config.log_data_operations);
        assert_eq!(config.max_field_length, 256);

        let verbose = LogConfig::verbose();
        assert!(verbose.log_rule_details);
        assert_eq!(verbose.base_level, Level::DEBUG);

        let production = LogConfig::production();
        assert!(!production.log_data_operations);
        assert_eq!(production.max_field_length, 128);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text that should be truncated", 10),
            "this is a ...(truncated)"
        );
        // Never splits a multi-byte character.
        assert_eq!(truncate_field("ééé", 3), "é...(truncated)");
    }

    #[test]
    fn test_env_filter() {
        let config = LoggingConfig::default().with_level(Level::WARN);
        assert_eq!(config.env_filter(), "warn,focus_guard=debug");

        let custom = LoggingConfig::default().with_env_filter("focus_guard=trace");
        assert_eq!(custom.env_filter(), "focus_guard=trace");
    }
}
