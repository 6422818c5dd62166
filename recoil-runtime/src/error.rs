//! Error Types
//!
//! Two failure modes are kept strictly apart:
//!
//! - [`ConditionError`] is an ordinary, recoverable error returned through
//!   `Result` by signalling and restart operations.
//! - [`UnmatchedEscape`] marks a structural bug (an escape to a tag with no
//!   active `establish`). It is raised as a panic payload and is never
//!   returned as a `ConditionError`.

use thiserror::Error;

use crate::value::Value;

/// Boxed error raised by user code inside a handler or restart action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the runtime.
pub type Result<T, E = ConditionError> = std::result::Result<T, E>;

/// Errors surfaced by signalling and restart operations.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// No handler anywhere took the condition and no fallback absorbed it.
    #[error("no matching handler for condition {0:?}")]
    NoMatchingHandler(Value),

    /// A restart looked up by name is not visible from here.
    #[error("restart not found: {0}")]
    RestartNotFound(String),

    /// An action failed with an application error.
    #[error("{0}")]
    Action(#[from] BoxError),
}

impl ConditionError {
    /// Wrap an application error raised from a handler or restart action.
    pub fn action<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        ConditionError::Action(error.into())
    }

    /// The unhandled condition, for [`ConditionError::NoMatchingHandler`].
    pub fn condition(&self) -> Option<&Value> {
        match self {
            ConditionError::NoMatchingHandler(condition) => Some(condition),
            _ => None,
        }
    }

    /// Returns `true` for [`ConditionError::NoMatchingHandler`].
    pub fn is_unhandled(&self) -> bool {
        matches!(self, ConditionError::NoMatchingHandler(_))
    }
}

/// Panic payload for an escape whose tag has no active catch point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unmatched escape to {tag}: no active establish for this tag in the current context")]
pub struct UnmatchedEscape {
    /// Human-readable description of the tag.
    pub tag: String,
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("invalid configuration for '{field}': {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },
    /// Environment variable parse error.
    #[error("failed to parse environment variable '{var}': {message}")]
    EnvParseError {
        /// Variable name.
        var: String,
        /// Error message.
        message: String,
    },
}
