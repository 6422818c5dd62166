//! Runtime Configuration
//!
//! Configuration for the condition runtime. It can be set programmatically or
//! loaded from environment variables, and is installed process-wide by
//! [`crate::init_with_runtime_config`].
//!
//! # Environment Variables
//!
//! All environment variables use the `RECOIL_` prefix:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RECOIL_UNHANDLED` | Fallback for unhandled conditions (raise/interactive) | raise |
//! | `RECOIL_PROPAGATION` | Dynamic state of spawned contexts (isolated/inherit) | isolated |
//! | `RECOIL_LOG_LEVEL` | Log level (off/error/warn/info/debug/trace) | info |
//! | `RECOIL_LOG_FILTER` | Extra `tracing` filter directives | none |
//! | `RECOIL_LOG_TIMESTAMPS` | Include timestamps in log output ("true"/"false") | true |
//!
//! # Example
//!
//! ```rust,ignore
//! use recoil_runtime::config::RuntimeConfig;
//!
//! // Load from environment with defaults
//! let config = RuntimeConfig::from_env();
//!
//! // Or use the builder pattern
//! let config = RuntimeConfig::builder()
//!     .unhandled(UnhandledFallback::Interactive)
//!     .propagation(PropagationMode::Inherit)
//!     .build()?;
//! ```

use std::env;

use tracing_subscriber::EnvFilter;

use crate::dynamic::PropagationMode;
use crate::error::ConfigError;
use crate::handler::UnhandledFallback;

/// Log level for runtime logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// No logging.
    Off,
    /// Error messages only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Informational messages (default).
    #[default]
    Info,
    /// Debug messages.
    Debug,
    /// Trace-level messages.
    Trace,
}

impl LogLevel {
    /// Parse a log level from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "none" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Condition handling configuration.
#[derive(Debug, Clone, Default)]
pub struct ConditionConfig {
    /// Initial fallback mode of every execution context.
    /// Default: Raise.
    pub unhandled: UnhandledFallback,
}

/// Execution context configuration.
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    /// How [`crate::dynamic::spawn`] seeds a new context.
    /// Default: Isolated.
    pub propagation: PropagationMode,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level.
    /// Default: Info.
    pub level: LogLevel,

    /// Additional filter directives, e.g. `recoil_runtime::handler=trace`.
    /// Default: none.
    pub filter: Option<String>,

    /// Include timestamps in log output.
    /// Default: true.
    pub timestamps: bool,

    /// Include source location in log output.
    /// Default: false (only in debug builds).
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            filter: None,
            timestamps: true,
            source_location: cfg!(debug_assertions),
        }
    }
}

impl LogConfig {
    /// The complete filter directive string for this configuration.
    pub fn directives(&self) -> String {
        match &self.filter {
            Some(filter) if !filter.trim().is_empty() => {
                format!("{},{}", self.level.as_str(), filter.trim())
            }
            _ => self.level.as_str().to_string(),
        }
    }
}

/// Complete runtime configuration.
///
/// Use `RuntimeConfig::default()` for sensible defaults, or
/// `RuntimeConfig::from_env()` to load from environment variables.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Condition handling configuration.
    pub conditions: ConditionConfig,

    /// Execution context configuration.
    pub context: ContextConfig,

    /// Logging configuration.
    pub log: LogConfig,
}

impl RuntimeConfig {
    /// Create a new builder for RuntimeConfig.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables that are not set will use default values.
    /// Invalid values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(mode) = env_var("RECOIL_UNHANDLED").and_then(|s| UnhandledFallback::from_str(&s)) {
            config.conditions.unhandled = mode;
        }

        if let Some(mode) = env_var("RECOIL_PROPAGATION").and_then(|s| PropagationMode::from_str(&s)) {
            config.context.propagation = mode;
        }

        if let Some(level) = env_var("RECOIL_LOG_LEVEL").and_then(|s| LogLevel::from_str(&s)) {
            config.log.level = level;
        }

        if let Some(filter) = env_var("RECOIL_LOG_FILTER") {
            config.log.filter = Some(filter);
        }

        if let Some(val) = parse_env_bool("RECOIL_LOG_TIMESTAMPS") {
            config.log.timestamps = val;
        }

        config
    }

    /// Load configuration from environment variables, rejecting invalid values.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(val) = env_var("RECOIL_UNHANDLED") {
            config.conditions.unhandled = UnhandledFallback::from_str(&val)
                .ok_or_else(|| env_error("RECOIL_UNHANDLED", &val, "expected raise or interactive"))?;
        }

        if let Some(val) = env_var("RECOIL_PROPAGATION") {
            config.context.propagation = PropagationMode::from_str(&val)
                .ok_or_else(|| env_error("RECOIL_PROPAGATION", &val, "expected isolated or inherit"))?;
        }

        if let Some(val) = env_var("RECOIL_LOG_LEVEL") {
            config.log.level = LogLevel::from_str(&val).ok_or_else(|| {
                env_error("RECOIL_LOG_LEVEL", &val, "expected off, error, warn, info, debug or trace")
            })?;
        }

        if let Some(val) = env_var("RECOIL_LOG_FILTER") {
            config.log.filter = Some(val);
        }

        if let Some(val) = env_var("RECOIL_LOG_TIMESTAMPS") {
            config.log.timestamps = parse_bool(&val)
                .ok_or_else(|| env_error("RECOIL_LOG_TIMESTAMPS", &val, "expected true or false"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(err) = EnvFilter::try_new(self.log.directives()) {
            return Err(ConfigError::InvalidValue {
                field: "log.filter".into(),
                message: err.to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for RuntimeConfig.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial fallback mode for unhandled conditions.
    pub fn unhandled(mut self, mode: UnhandledFallback) -> Self {
        self.config.conditions.unhandled = mode;
        self
    }

    /// Set how spawned contexts are seeded.
    pub fn propagation(mut self, mode: PropagationMode) -> Self {
        self.config.context.propagation = mode;
        self
    }

    /// Set the log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log.level = level;
        self
    }

    /// Set additional log filter directives.
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log.filter = Some(filter.into());
        self
    }

    /// Enable or disable timestamps in log output.
    pub fn log_timestamps(mut self, enabled: bool) -> Self {
        self.config.log.timestamps = enabled;
        self
    }

    /// Enable or disable source locations in log output.
    pub fn log_source_location(mut self, enabled: bool) -> Self {
        self.config.log.source_location = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// This validates the configuration and returns an error if invalid.
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation.
    pub fn build_unchecked(self) -> RuntimeConfig {
        self.config
    }
}

/// Read an environment variable, treating unset and non-UTF-8 alike.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an environment variable as bool.
fn parse_env_bool(name: &str) -> Option<bool> {
    env_var(name).and_then(|s| parse_bool(&s))
}

fn env_error(var: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::EnvParseError {
        var: var.into(),
        message: format!("invalid value '{}': {}", value, expected),
    }
}
