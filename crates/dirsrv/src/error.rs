//! Error types for the dirsrv crate

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a failure, used to decide how far it propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Desired state does not fit the schema or is inconsistent
    Schema,
    /// A dse.ldif could not be read
    Snapshot,
    /// Create raced with an existing entry
    AlreadyExists,
    /// A write targeted something that is not there
    NoSuchEntry,
    /// The change needs the instance stopped
    Offline,
    /// Host-side failure (filesystem, state file)
    Host,
    Other,
}

/// Errors raised while loading, observing or reconciling directory servers
#[derive(Error, Debug)]
pub enum Error {
    /// Schema violation reported by the option tables
    #[error(transparent)]
    Schema(#[from] declarative::Error),

    /// Inconsistent configuration (replica role, topology)
    #[error("{path}: {message}")]
    Invalid { path: String, message: String },

    /// Desired-state document could not be decoded
    #[error("invalid desired state: {0}")]
    Input(String),

    /// Snapshot or write-operation failure
    #[error(transparent)]
    Dse(#[from] dse::Error),

    #[error("{attr} in {dn} can only be changed while instance {instance} is stopped")]
    RequiresOffline {
        instance: String,
        dn: String,
        attr: String,
    },

    #[error("instance {0} not found")]
    NoSuchInstance(String),

    #[error("instance {0} already exists")]
    InstanceExists(String),

    /// Host state file could not be used
    #[error("state file {path}: {message}")]
    State { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure located in the entity tree
    #[error("{path}: {cause}")]
    Entity { path: String, cause: Box<Error> },
}

impl Error {
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Attach the entity path, keeping the innermost one.
    pub fn at(self, path: &str) -> Self {
        match self {
            Self::Entity { .. } | Self::Invalid { .. } | Self::Schema(_) => self,
            other => Self::Entity {
                path: path.to_string(),
                cause: Box::new(other),
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Schema(_) | Self::Invalid { .. } | Self::Input(_) => ErrorCategory::Schema,
            Self::Dse(err) => match err {
                dse::Error::NotPresent(_) | dse::Error::Parse { .. } => ErrorCategory::Snapshot,
                dse::Error::EntryExists(_) => ErrorCategory::AlreadyExists,
                dse::Error::NoSuchEntry(_) | dse::Error::NoSuchValue { .. } => {
                    ErrorCategory::NoSuchEntry
                }
                dse::Error::Io(_) | dse::Error::NotLeaf(_) => ErrorCategory::Host,
                _ => ErrorCategory::Other,
            },
            Self::RequiresOffline { .. } => ErrorCategory::Offline,
            Self::NoSuchInstance(_) => ErrorCategory::NoSuchEntry,
            Self::InstanceExists(_) => ErrorCategory::AlreadyExists,
            Self::State { .. } | Self::Io(_) => ErrorCategory::Host,
            Self::Entity { cause, .. } => cause.category(),
        }
    }

    /// Create found the entry already there: retry as a modify.
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::AlreadyExists
    }

    /// Raised while loading or observing, before anything was written.
    pub fn is_fatal_before_write(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Schema | ErrorCategory::Snapshot
        )
    }
}

/// Result type alias for dirsrv operations
pub type Result<T> = std::result::Result<T, Error>;
