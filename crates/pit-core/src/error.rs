//! Error types for plotit

use thiserror::Error;

/// plotit error type
#[derive(Error, Debug)]
pub enum Error {
    /// The backing distribution is missing, unreadable or malformed.
    #[error("distribution '{name}' unavailable from '{source_id}': {reason}")]
    DataUnavailable {
        /// Identifier of the data source (usually a file path).
        source_id: String,
        /// Histogram name inside the source.
        name: String,
        /// Human-readable cause.
        reason: String,
    },

    /// A shape variation could not be found (strict mode only).
    #[error("no '{direction}' variation of '{histogram}' for systematic '{systematic}'")]
    ShapeVariationMissing {
        /// Nominal histogram name.
        histogram: String,
        /// Systematic name.
        systematic: String,
        /// `"up"` or `"down"`.
        direction: String,
    },

    /// Mutation of a frozen stack or group.
    #[error("illegal mutation: {0}")]
    IllegalMutation(String),

    /// Arrays or distributions with different binning were combined.
    #[error("incompatible shapes in {context}: expected {expected}, found {found}")]
    IncompatibleShapes {
        /// Where the mismatch was detected.
        context: String,
        /// Expected length (or entry count).
        expected: usize,
        /// Actual length (or entry count).
        found: usize,
    },

    /// Total requested for a stack without entries.
    #[error("cannot construct a stack total without entries")]
    EmptyStack,

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Shorthand for [`Error::IncompatibleShapes`].
    pub fn shape_mismatch(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Error::IncompatibleShapes { context: context.into(), expected, found }
    }

    /// Whether this error reports a missing or unreadable distribution.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Error::DataUnavailable { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
