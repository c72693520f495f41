//! Error types for rule tables.

use thiserror::Error;

/// Errors raised while building or loading rule tables.
#[derive(Error, Debug)]
pub enum RuleError {
    /// A regex or selector failed to compile
    #[error("invalid pattern {id}: {reason}")]
    InvalidPattern {
        /// Rule identifier
        id: String,
        /// Why compilation failed
        reason: String,
    },

    /// Classification weight outside (0, 1]
    #[error("invalid weight for {id}: {weight} is outside (0, 1]")]
    InvalidWeight {
        /// Pattern identifier
        id: String,
        /// Offending weight
        weight: f64,
    },

    /// A matcher kind that cannot be used in the given position
    #[error("{id}: {reason}")]
    Unsupported {
        /// Rule identifier
        id: String,
        /// What was wrong
        reason: String,
    },

    /// Rule file not found
    #[error("rule file not found at {path}")]
    NotFound {
        /// Expected path
        path: String,
    },

    /// Failed to parse rule file TOML
    #[error("failed to parse rule file {path}: {source}")]
    ParseError {
        /// Path to the rule file
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// I/O error while reading a rule file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
