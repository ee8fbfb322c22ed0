//! Error types for snapshot reading and diff application.
//!
//! A missing configuration file is reported separately from a malformed one:
//! callers treat [`Error::NotPresent`] as "the entity does not exist" while
//! every other variant is fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading, writing or applying snapshots.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file does not exist
    #[error("no configuration present at {0}")]
    NotPresent(PathBuf),

    /// Malformed LDIF record
    #[error("invalid LDIF at line {line}: {message}")]
    Parse {
        /// Line number where the parse error occurred (1-indexed)
        line: usize,
        /// Description of the syntax error
        message: String,
    },

    /// The same value appears twice in one attribute
    #[error("duplicate value '{value}' for attribute {attr} in {dn}")]
    DuplicateValue {
        /// Entry DN
        dn: String,
        /// Attribute name
        attr: String,
        /// Offending value
        value: String,
    },

    /// An entry with this DN already exists
    #[error("entry already exists: {0}")]
    EntryExists(String),

    /// No entry with this DN
    #[error("no such entry: {0}")]
    NoSuchEntry(String),

    /// The entry still has children
    #[error("operation not allowed on non-leaf entry: {0}")]
    NotLeaf(String),

    /// A value to delete is not present
    #[error("no such value '{value}' for attribute {attr} in {dn}")]
    NoSuchValue {
        /// Entry DN
        dn: String,
        /// Attribute name
        attr: String,
        /// Missing value
        value: String,
    },

    /// A change record that cannot be interpreted
    #[error("invalid change for {dn}: {message}")]
    InvalidChange {
        /// Entry DN
        dn: String,
        /// What is wrong with it
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means "no configuration" rather than a failure.
    pub fn is_not_present(&self) -> bool {
        matches!(self, Self::NotPresent(_))
    }
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_present_is_distinct() {
        let err = Error::NotPresent(PathBuf::from("/nowhere/dse.ldif"));
        assert!(err.is_not_present());
        assert!(
            !Error::Parse {
                line: 1,
                message: "x".into()
            }
            .is_not_present()
        );
    }

    #[test]
    fn test_parse_error_message() {
        let err = Error::Parse {
            line: 3,
            message: "record does not start with a dn line".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid LDIF at line 3: record does not start with a dn line"
        );
    }
}
