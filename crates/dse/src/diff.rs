//! Structural comparison of two snapshots.
//!
//! [`diff`] compares a target snapshot against a baseline and returns the
//! changes that turn the baseline into the target:
//!
//! - DN only in the target: [`Change::AddEntry`] with every attribute
//! - DN only in the baseline: [`Change::DeleteEntry`]
//! - attribute only in the target: [`Change::AddValues`]
//! - attribute only in the baseline: [`Change::DeleteValues`]
//! - single value on both sides: [`Change::ReplaceValues`]
//! - otherwise: add/delete of the symmetric difference
//!
//! Values are compared normalized, so formatting-only differences are not
//! reported.

use crate::dn::{Dn, normalize_value};
use crate::entry::{Entry, same_value_set};
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    AddEntry,
    DeleteEntry,
    AddValue,
    DeleteValue,
    ReplaceValue,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddEntry => "add-entry",
            Self::DeleteEntry => "delete-entry",
            Self::AddValue => "add-value",
            Self::DeleteValue => "delete-value",
            Self::ReplaceValue => "replace-value",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Create an entry with all its attributes
    AddEntry { entry: Entry },
    /// Remove an entry
    DeleteEntry { dn: Dn },
    /// Add values to an attribute
    AddValues {
        dn: Dn,
        attr: String,
        values: Vec<String>,
    },
    /// Remove values from an attribute
    DeleteValues {
        dn: Dn,
        attr: String,
        values: Vec<String>,
    },
    /// Set the values of an attribute
    ReplaceValues {
        dn: Dn,
        attr: String,
        values: Vec<String>,
    },
}

impl Change {
    pub fn dn(&self) -> &Dn {
        match self {
            Self::AddEntry { entry } => &entry.dn,
            Self::DeleteEntry { dn }
            | Self::AddValues { dn, .. }
            | Self::DeleteValues { dn, .. }
            | Self::ReplaceValues { dn, .. } => dn,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::AddEntry { .. } => ChangeKind::AddEntry,
            Self::DeleteEntry { .. } => ChangeKind::DeleteEntry,
            Self::AddValues { .. } => ChangeKind::AddValue,
            Self::DeleteValues { .. } => ChangeKind::DeleteValue,
            Self::ReplaceValues { .. } => ChangeKind::ReplaceValue,
        }
    }

    /// The attribute of a value-level change.
    pub fn attr(&self) -> Option<&str> {
        match self {
            Self::AddValues { attr, .. }
            | Self::DeleteValues { attr, .. }
            | Self::ReplaceValues { attr, .. } => Some(attr),
            Self::AddEntry { .. } | Self::DeleteEntry { .. } => None,
        }
    }

    /// Sort key: additions and modifications parent-first, then deletions
    /// deepest-first.
    fn order_key(&self) -> (u8, usize, &Dn, &str, u8) {
        let dn = self.dn();
        let attr = self.attr().unwrap_or("");
        match self {
            Self::DeleteEntry { .. } => (1, usize::MAX - dn.depth(), dn, attr, 0),
            Self::AddEntry { .. } => (0, dn.depth(), dn, attr, 0),
            Self::DeleteValues { .. } => (0, dn.depth(), dn, attr, 1),
            Self::AddValues { .. } => (0, dn.depth(), dn, attr, 2),
            Self::ReplaceValues { .. } => (0, dn.depth(), dn, attr, 3),
        }
    }
}

/// Nested `DN -> kind -> attribute -> values` form of a diff.
///
/// Used for facts output and for `dse_mods` in desired-state input.
pub type DiffMap = BTreeMap<String, BTreeMap<ChangeKind, BTreeMap<String, Vec<String>>>>;

/// An ordered set of changes.
///
/// Changes are kept sorted so they can be applied in sequence: entries and
/// values are added parent-first, entries are deleted deepest-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DiffMap", into = "DiffMap")]
pub struct DiffResult {
    changes: Vec<Change>,
}

impl DiffResult {
    /// Build a result from unordered changes.
    ///
    /// A DN that is deleted keeps only its delete change.
    pub fn new(changes: Vec<Change>) -> Self {
        let deleted: BTreeSet<Dn> = changes
            .iter()
            .filter_map(|c| match c {
                Change::DeleteEntry { dn } => Some(dn.clone()),
                _ => None,
            })
            .collect();
        let mut changes: Vec<Change> = changes
            .into_iter()
            .filter(|c| matches!(c, Change::DeleteEntry { .. }) || !deleted.contains(c.dn()))
            .collect();
        changes.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        Self { changes }
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Changes that touch `dn`.
    pub fn for_dn<'a>(&'a self, dn: &'a Dn) -> impl Iterator<Item = &'a Change> {
        self.changes.iter().filter(move |c| c.dn() == dn)
    }

    /// Distinct DNs touched by the diff.
    pub fn dns(&self) -> BTreeSet<&Dn> {
        self.changes.iter().map(Change::dn).collect()
    }

    /// Keep only the changes for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&Change) -> bool) {
        self.changes.retain(keep);
    }

    /// Remove the value-level changes of one attribute of one entry.
    pub fn remove_attr(&mut self, dn: &Dn, attr: &str) {
        self.changes
            .retain(|c| !(c.dn() == dn && c.attr().is_some_and(|a| a.eq_ignore_ascii_case(attr))));
    }

    /// Append the changes of another diff, keeping the ordering.
    pub fn extend(&mut self, other: Self) {
        let mut changes = std::mem::take(&mut self.changes);
        changes.extend(other.changes);
        *self = Self::new(changes);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Nested map form.
    pub fn to_map(&self) -> DiffMap {
        let mut map = DiffMap::new();
        for change in &self.changes {
            let kinds = map.entry(change.dn().to_string()).or_default();
            let attrs = kinds.entry(change.kind()).or_default();
            match change {
                Change::AddEntry { entry } => {
                    for (attr, values) in entry.attributes() {
                        attrs.insert(attr.to_string(), values.to_vec());
                    }
                }
                Change::DeleteEntry { .. } => {}
                Change::AddValues { attr, values, .. }
                | Change::DeleteValues { attr, values, .. }
                | Change::ReplaceValues { attr, values, .. } => {
                    attrs.entry(attr.clone()).or_default().extend(values.iter().cloned());
                }
            }
        }
        map
    }

    /// Rebuild a result from its nested map form.
    pub fn from_map(map: DiffMap) -> Result<Self> {
        let mut changes = Vec::new();
        for (raw_dn, kinds) in map {
            let dn = Dn::new(&raw_dn);
            if kinds.contains_key(&ChangeKind::DeleteEntry) && kinds.len() > 1 {
                return Err(Error::InvalidChange {
                    dn: raw_dn,
                    message: "delete-entry cannot be combined with other changes".to_string(),
                });
            }
            for (kind, attrs) in kinds {
                match kind {
                    ChangeKind::AddEntry => {
                        let entry = Entry::with_attrs(&raw_dn, attrs)?;
                        changes.push(Change::AddEntry { entry });
                    }
                    ChangeKind::DeleteEntry => changes.push(Change::DeleteEntry { dn: dn.clone() }),
                    ChangeKind::AddValue | ChangeKind::DeleteValue | ChangeKind::ReplaceValue => {
                        for (attr, values) in attrs {
                            let attr = attr.to_lowercase();
                            let dn = dn.clone();
                            changes.push(match kind {
                                ChangeKind::AddValue => Change::AddValues { dn, attr, values },
                                ChangeKind::DeleteValue => Change::DeleteValues { dn, attr, values },
                                _ => Change::ReplaceValues { dn, attr, values },
                            });
                        }
                    }
                }
            }
        }
        Ok(Self::new(changes))
    }
}

impl TryFrom<DiffMap> for DiffResult {
    type Error = Error;

    fn try_from(map: DiffMap) -> Result<Self> {
        Self::from_map(map)
    }
}

impl From<DiffResult> for DiffMap {
    fn from(diff: DiffResult) -> Self {
        diff.to_map()
    }
}

/// Compute the changes that turn `baseline` into `target`.
pub fn diff(target: &Snapshot, baseline: &Snapshot) -> DiffResult {
    let dns: BTreeSet<&Dn> = target.dns().chain(baseline.dns()).collect();
    let mut changes = Vec::new();

    for dn in dns {
        match (target.get_dn(dn), baseline.get_dn(dn)) {
            (Some(entry), None) => changes.push(Change::AddEntry {
                entry: entry.clone(),
            }),
            (None, Some(_)) => changes.push(Change::DeleteEntry { dn: dn.clone() }),
            (Some(t), Some(b)) => diff_entry(t, b, &mut changes),
            (None, None) => {}
        }
    }

    DiffResult::new(changes)
}

fn diff_entry(target: &Entry, baseline: &Entry, changes: &mut Vec<Change>) {
    let attrs: BTreeSet<&str> = target
        .attribute_names()
        .chain(baseline.attribute_names())
        .collect();
    let dn = &target.dn;

    for attr in attrs {
        match (target.values(attr), baseline.values(attr)) {
            (Some(values), None) => changes.push(Change::AddValues {
                dn: dn.clone(),
                attr: attr.to_string(),
                values: values.to_vec(),
            }),
            (None, Some(values)) => changes.push(Change::DeleteValues {
                dn: dn.clone(),
                attr: attr.to_string(),
                values: values.to_vec(),
            }),
            (Some(t), Some(b)) if !same_value_set(t, b) => {
                if t.len() == 1 && b.len() == 1 {
                    changes.push(Change::ReplaceValues {
                        dn: dn.clone(),
                        attr: attr.to_string(),
                        values: t.to_vec(),
                    });
                    continue;
                }
                let deleted = missing_from(b, t);
                let added = missing_from(t, b);
                if !deleted.is_empty() {
                    changes.push(Change::DeleteValues {
                        dn: dn.clone(),
                        attr: attr.to_string(),
                        values: deleted,
                    });
                }
                if !added.is_empty() {
                    changes.push(Change::AddValues {
                        dn: dn.clone(),
                        attr: attr.to_string(),
                        values: added,
                    });
                }
            }
            _ => {}
        }
    }
}

/// Values of `from` not present in `other`, compared normalized.
fn missing_from(from: &[String], other: &[String]) -> Vec<String> {
    let other: BTreeSet<String> = other.iter().map(|v| normalize_value(v)).collect();
    from.iter()
        .filter(|v| !other.contains(&normalize_value(v)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldif::parse_string;

    const BASE: &str = "dn: cn=config
objectClass: top
nsslapd-port: 389
nsslapd-rootdn: cn=Directory Manager

dn: cn=plugins,cn=config
objectClass: top
objectClass: nsContainer
cn: plugins

dn: cn=old,cn=plugins,cn=config
objectClass: top
cn: old
";

    const TARGET: &str = "dn: cn=config
objectClass: top
objectClass: extensibleObject
nsslapd-port: 3389
nsslapd-rootdn: CN=directory manager
nsslapd-ldapifilepath: /run/slapd.socket

dn: cn=plugins,cn=config
objectClass: top
cn: plugins

dn: cn=new,cn=plugins,cn=config
objectClass: top
cn: new
";

    #[test]
    fn test_identical_snapshots_have_no_diff() {
        let snap = parse_string(BASE).unwrap();
        assert!(diff(&snap, &snap).is_empty());
    }

    #[test]
    fn test_kinds() {
        let result = diff(&parse_string(TARGET).unwrap(), &parse_string(BASE).unwrap());
        let config = Dn::new("cn=config");
        let kinds: Vec<(ChangeKind, Option<&str>)> = result
            .for_dn(&config)
            .map(|c| (c.kind(), c.attr()))
            .collect();
        assert_eq!(kinds, vec![
            (ChangeKind::AddValue, Some("nsslapd-ldapifilepath")),
            (ChangeKind::ReplaceValue, Some("nsslapd-port")),
            (ChangeKind::AddValue, Some("objectclass")),
        ]);
    }

    #[test]
    fn test_formatting_only_change_not_reported() {
        let result = diff(&parse_string(TARGET).unwrap(), &parse_string(BASE).unwrap());
        assert!(result.iter().all(|c| c.attr() != Some("nsslapd-rootdn")));
    }

    #[test]
    fn test_multi_valued_uses_symmetric_difference() {
        let result = diff(&parse_string(TARGET).unwrap(), &parse_string(BASE).unwrap());
        let plugins = Dn::new("cn=plugins,cn=config");
        let changes: Vec<&Change> = result.for_dn(&plugins).collect();
        assert_eq!(changes, vec![&Change::DeleteValues {
            dn: plugins.clone(),
            attr: "objectclass".into(),
            values: vec!["nsContainer".into()],
        }]);
    }

    #[test]
    fn test_ordering_adds_before_deletes() {
        let result = diff(&parse_string(TARGET).unwrap(), &parse_string(BASE).unwrap());
        let last = result.changes().last().unwrap();
        assert_eq!(last.kind(), ChangeKind::DeleteEntry);
        assert_eq!(last.dn(), &Dn::new("cn=old,cn=plugins,cn=config"));
    }

    #[test]
    fn test_deletes_deepest_first() {
        let base = parse_string(BASE).unwrap();
        let result = diff(&Snapshot::new(), &base);
        let depths: Vec<usize> = result.iter().map(|c| c.dn().depth()).collect();
        assert_eq!(depths, vec![3, 2, 1]);
    }

    #[test]
    fn test_delete_entry_is_exclusive() {
        let dn = Dn::new("cn=x");
        let result = DiffResult::new(vec![
            Change::AddValues {
                dn: dn.clone(),
                attr: "cn".into(),
                values: vec!["x".into()],
            },
            Change::DeleteEntry { dn: dn.clone() },
        ]);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_remove_attr() {
        let mut result = diff(&parse_string(TARGET).unwrap(), &parse_string(BASE).unwrap());
        let config = Dn::new("cn=config");
        result.remove_attr(&config, "NSSLAPD-PORT");
        assert!(result.for_dn(&config).all(|c| c.attr() != Some("nsslapd-port")));
    }

    #[test]
    fn test_map_form() {
        let result = diff(&parse_string(TARGET).unwrap(), &parse_string(BASE).unwrap());
        let map = result.to_map();
        assert_eq!(
            map["cn=config"][&ChangeKind::ReplaceValue]["nsslapd-port"],
            vec!["3389".to_string()]
        );
        assert!(map["cn=old,cn=plugins,cn=config"][&ChangeKind::DeleteEntry].is_empty());
        assert_eq!(DiffResult::from_map(map).unwrap(), result);
    }

    #[test]
    fn test_map_rejects_delete_with_other_kinds() {
        let mut kinds = BTreeMap::new();
        kinds.insert(ChangeKind::DeleteEntry, BTreeMap::new());
        kinds.insert(
            ChangeKind::AddValue,
            BTreeMap::from([("cn".to_string(), vec!["x".to_string()])]),
        );
        let map = DiffMap::from([("cn=x".to_string(), kinds)]);
        assert!(matches!(
            DiffResult::from_map(map),
            Err(Error::InvalidChange { .. })
        ));
    }

    #[test]
    fn test_serde_nested_shape() {
        let json = r#"{"cn=config": {"replace-value": {"nsslapd-port": ["3389"]}}}"#;
        let result: DiffResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.changes()[0].kind(), ChangeKind::ReplaceValue);
    }
}
