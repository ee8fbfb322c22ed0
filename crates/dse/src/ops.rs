//! Directory write operations.
//!
//! Every [`Change`] maps onto one of the three native write primitives:
//! add an entry, delete an entry, or modify an entry's attributes.

use crate::diff::{Change, DiffResult};
use crate::dn::Dn;
use crate::entry::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attributes whose values are never displayed.
pub const SECRET_ATTRIBUTES: &[&str] = &[
    "nsslapd-rootpw",
    "userpassword",
    "nsds5replicacredentials",
    "nsds5replicabootstrapcredentials",
    "nsmultiplexorcredentials",
];

/// Placeholder shown instead of a secret value.
pub const MASK: &str = "******";

/// Whether an attribute holds a secret.
pub fn is_secret_attribute(attr: &str) -> bool {
    SECRET_ATTRIBUTES.contains(&attr.to_lowercase().as_str())
}

/// Kind of an attribute modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModKind {
    Add,
    Delete,
    Replace,
}

impl fmt::Display for ModKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "Add"),
            Self::Delete => write!(f, "Delete"),
            Self::Replace => write!(f, "Replace"),
        }
    }
}

/// One attribute modification inside a modify operation.
///
/// An empty value list on `Delete` removes the whole attribute, on `Replace`
/// it clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub kind: ModKind,
    pub attr: String,
    pub values: Vec<String>,
}

impl Modification {
    pub fn new(kind: ModKind, attr: &str, values: Vec<String>) -> Self {
        Self {
            kind,
            attr: attr.to_lowercase(),
            values,
        }
    }

    pub fn add(attr: &str, values: Vec<String>) -> Self {
        Self::new(ModKind::Add, attr, values)
    }

    pub fn delete(attr: &str, values: Vec<String>) -> Self {
        Self::new(ModKind::Delete, attr, values)
    }

    pub fn replace(attr: &str, values: Vec<String>) -> Self {
        Self::new(ModKind::Replace, attr, values)
    }
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return write!(f, "{} {}", self.kind, self.attr);
        }
        let values = if is_secret_attribute(&self.attr) {
            MASK.to_string()
        } else {
            self.values.join(", ")
        };
        write!(f, "{} {}: {}", self.kind, self.attr, values)
    }
}

/// A native write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AddEntry(Entry),
    DeleteEntry(Dn),
    Modify { dn: Dn, mods: Vec<Modification> },
}

impl Operation {
    pub fn dn(&self) -> &Dn {
        match self {
            Self::AddEntry(entry) => &entry.dn,
            Self::DeleteEntry(dn) | Self::Modify { dn, .. } => dn,
        }
    }

    /// Single-modification shorthand.
    pub fn modify(dn: Dn, modification: Modification) -> Self {
        Self::Modify {
            dn,
            mods: vec![modification],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddEntry(entry) => write!(f, "Adding entry {}", entry.raw_dn),
            Self::DeleteEntry(dn) => write!(f, "Deleting entry {dn}"),
            Self::Modify { dn, mods } => {
                let mods: Vec<String> = mods.iter().map(ToString::to_string).collect();
                write!(f, "{} in {dn}", mods.join("; "))
            }
        }
    }
}

impl From<Change> for Operation {
    fn from(change: Change) -> Self {
        match change {
            Change::AddEntry { entry } => Self::AddEntry(entry),
            Change::DeleteEntry { dn } => Self::DeleteEntry(dn),
            Change::AddValues { dn, attr, values } => Self::modify(dn, Modification::add(&attr, values)),
            Change::DeleteValues { dn, attr, values } => {
                Self::modify(dn, Modification::delete(&attr, values))
            }
            Change::ReplaceValues { dn, attr, values } => {
                Self::modify(dn, Modification::replace(&attr, values))
            }
        }
    }
}

impl DiffResult {
    /// Translate into write operations, one per change, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.iter().cloned().map(Operation::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_display() {
        let op = Operation::modify(
            Dn::new("cn=config"),
            Modification::replace("nsslapd-port", vec!["3389".into()]),
        );
        assert_eq!(op.to_string(), "Replace nsslapd-port: 3389 in cn=config");
    }

    #[test]
    fn test_secret_values_masked() {
        let op = Operation::modify(
            Dn::new("cn=config"),
            Modification::replace("nsslapd-rootpw", vec!["secret".into()]),
        );
        let text = op.to_string();
        assert!(!text.contains("secret"));
        assert!(text.contains(MASK));
    }

    #[test]
    fn test_change_maps_one_to_one() {
        let dn = Dn::new("cn=x");
        let op = Operation::from(Change::DeleteValues {
            dn: dn.clone(),
            attr: "Description".into(),
            values: vec!["a".into()],
        });
        assert_eq!(
            op,
            Operation::modify(dn, Modification::delete("description", vec!["a".into()]))
        );
    }
}
