//! Schema errors raised while checking desired values against option tables.

use thiserror::Error;

/// Errors found while validating an entity against its schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A field that no option or child kind declares
    #[error("{path}: unknown field '{field}'")]
    UnknownField { path: String, field: String },

    /// A required option without a value
    #[error("{path}: missing required field '{field}'")]
    MissingField { path: String, field: String },

    /// A value outside the option's choice set
    #[error("{path}: invalid value '{value}' for {option} (expected one of: {})", choices.join(", "))]
    InvalidChoice {
        path: String,
        option: String,
        value: String,
        choices: Vec<String>,
    },

    /// A value of the wrong shape or type
    #[error("{path}: invalid value for {option}: {message}")]
    InvalidValue {
        path: String,
        option: String,
        message: String,
    },
}

impl Error {
    /// The entity path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::UnknownField { path, .. }
            | Self::MissingField { path, .. }
            | Self::InvalidChoice { path, .. }
            | Self::InvalidValue { path, .. } => path,
        }
    }
}

/// Result type for schema checks.
pub type Result<T> = std::result::Result<T, Error>;
