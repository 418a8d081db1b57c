//! Error types for the scclust-eval library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Non-finite DE factor {value} for gene '{gene}', group {group}")]
    NonFiniteFactor {
        gene: String,
        group: usize,
        value: f64,
    },

    #[error("Invalid value '{value}' at line {line}, column '{column}': {reason}")]
    Parse {
        line: usize,
        column: String,
        value: String,
        reason: String,
    },

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Duplicate replicate id {0}")]
    DuplicateReplicate(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    /// Shorthand for a length mismatch between two parallel inputs.
    pub fn length_mismatch(what: &str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what: what.to_string(),
            expected,
            actual,
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, EvalError>;
