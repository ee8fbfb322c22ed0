//! # dse
//!
//! Reader, writer and structural diff for 389 Directory Server `dse.ldif`
//! configuration snapshots.
//!
//! This crate provides functionality for:
//! - Parsing `dse.ldif` into a normalized [`Snapshot`] indexed by known class
//! - Writing snapshots back as LDIF
//! - Comparing two snapshots entry by entry and attribute by attribute
//! - Translating a diff into native write [`Operation`]s and applying them
//!
//! ## Example
//!
//! ```
//! use dse::{diff, ldif, ChangeKind};
//!
//! # fn main() -> Result<(), dse::Error> {
//! let observed = ldif::parse_string("dn: cn=config\nnsslapd-port: 3389\n")?;
//! let defaults = ldif::parse_string("dn: cn=config\nnsslapd-port: 389\n")?;
//!
//! let changes = diff(&observed, &defaults);
//! assert_eq!(changes.changes()[0].kind(), ChangeKind::ReplaceValue);
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod diff;
pub mod dn;
pub mod entry;
pub mod error;
pub mod ldif;
pub mod ops;
pub mod snapshot;

pub use apply::{Store, apply};
pub use diff::{Change, ChangeKind, DiffMap, DiffResult, diff};
pub use dn::{Dn, escape_value, normalize_value, values_equal};
pub use entry::Entry;
pub use error::{Error, Result};
pub use ops::{MASK, ModKind, Modification, Operation, is_secret_attribute};
pub use snapshot::{KnownClass, Snapshot, is_ignored_attribute};
