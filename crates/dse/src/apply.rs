//! In-memory entry store that write operations are applied to.

use crate::diff::DiffResult;
use crate::dn::Dn;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::ops::{ModKind, Modification, Operation};
use crate::snapshot::Snapshot;
use std::collections::BTreeMap;

/// Mutable set of entries with native write semantics.
///
/// Operations are strict: adding an existing entry, deleting a missing one,
/// deleting an entry with children, adding a present value or deleting an
/// absent one all fail.
#[derive(Debug, Clone, Default)]
pub struct Store {
    entries: BTreeMap<Dn, Entry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            entries: snapshot.into_entries().map(|e| (e.dn.clone(), e)).collect(),
        }
    }

    /// A snapshot of the current content.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_entries(self.entries.values().cloned())
    }

    pub fn get(&self, dn: &Dn) -> Option<&Entry> {
        self.entries.get(dn)
    }

    pub fn contains(&self, dn: &Dn) -> bool {
        self.entries.contains_key(dn)
    }

    pub fn has_children(&self, dn: &Dn) -> bool {
        self.entries.keys().any(|k| k.is_descendant_of(dn))
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> Result<()> {
        match op {
            Operation::AddEntry(entry) => self.add_entry(entry.clone()),
            Operation::DeleteEntry(dn) => self.delete_entry(dn),
            Operation::Modify { dn, mods } => self.modify(dn, mods),
        }
    }

    fn add_entry(&mut self, entry: Entry) -> Result<()> {
        if self.entries.contains_key(&entry.dn) {
            return Err(Error::EntryExists(entry.dn.to_string()));
        }
        if let Some(parent) = entry.dn.parent() {
            if !parent.is_root() && !self.entries.contains_key(&parent) {
                return Err(Error::NoSuchEntry(parent.to_string()));
            }
        }
        self.entries.insert(entry.dn.clone(), entry);
        Ok(())
    }

    fn delete_entry(&mut self, dn: &Dn) -> Result<()> {
        if !self.entries.contains_key(dn) {
            return Err(Error::NoSuchEntry(dn.to_string()));
        }
        if self.has_children(dn) {
            return Err(Error::NotLeaf(dn.to_string()));
        }
        self.entries.remove(dn);
        Ok(())
    }

    /// Apply every modification or none of them.
    fn modify(&mut self, dn: &Dn, mods: &[Modification]) -> Result<()> {
        let Some(current) = self.entries.get(dn) else {
            return Err(Error::NoSuchEntry(dn.to_string()));
        };
        let mut entry = current.clone();

        for m in mods {
            match m.kind {
                ModKind::Add => {
                    for value in &m.values {
                        entry.add_value(&m.attr, value.clone())?;
                    }
                }
                ModKind::Delete if m.values.is_empty() => {
                    if !entry.remove_attr(&m.attr) {
                        return Err(Error::NoSuchValue {
                            dn: dn.to_string(),
                            attr: m.attr.clone(),
                            value: String::new(),
                        });
                    }
                }
                ModKind::Delete => {
                    for value in &m.values {
                        if !entry.remove_value(&m.attr, value) {
                            return Err(Error::NoSuchValue {
                                dn: dn.to_string(),
                                attr: m.attr.clone(),
                                value: value.clone(),
                            });
                        }
                    }
                }
                ModKind::Replace => entry.replace(&m.attr, m.values.clone())?,
            }
        }

        self.entries.insert(dn.clone(), entry);
        Ok(())
    }
}

/// Apply a diff to a snapshot, producing the resulting snapshot.
pub fn apply(baseline: &Snapshot, diff: &DiffResult) -> Result<Snapshot> {
    let mut store = Store::from_snapshot(baseline.clone());
    for op in diff.operations() {
        store.apply(&op)?;
    }
    Ok(store.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::ldif::parse_string;

    const A: &str = "dn: cn=config
objectClass: top
nsslapd-port: 389
nsslapd-referral: ldap://a
nsslapd-referral: ldap://b

dn: cn=plugins,cn=config
objectClass: top
cn: plugins

dn: cn=gone,cn=plugins,cn=config
objectClass: top
cn: gone

dn: cn=gone2,cn=gone,cn=plugins,cn=config
objectClass: top
cn: gone2
";

    const B: &str = "dn: cn=config
objectClass: top
objectClass: extensibleObject
nsslapd-port: 3389
nsslapd-referral: ldap://b
nsslapd-referral: ldap://c

dn: cn=plugins,cn=config
objectClass: top
cn: plugins
description: added

dn: cn=new,cn=plugins,cn=config
objectClass: top
cn: new

dn: cn=child,cn=new,cn=plugins,cn=config
objectClass: top
cn: child
";

    #[test]
    fn test_round_trip_reproduces_target() {
        let a = parse_string(A).unwrap();
        let b = parse_string(B).unwrap();
        let result = apply(&a, &diff(&b, &a)).unwrap();
        assert_eq!(result, b);

        // Value order may differ, attribute sets may not.
        let back = apply(&b, &diff(&a, &b)).unwrap();
        assert!(diff(&back, &a).is_empty());
        assert_eq!(back.len(), a.len());
    }

    #[test]
    fn test_empty_diff_is_noop() {
        let a = parse_string(A).unwrap();
        assert_eq!(apply(&a, &DiffResult::default()).unwrap(), a);
    }

    #[test]
    fn test_add_existing_entry_fails() {
        let mut store = Store::from_snapshot(parse_string(A).unwrap());
        let entry = Entry::new("cn=config");
        assert!(matches!(
            store.apply(&Operation::AddEntry(entry)),
            Err(Error::EntryExists(_))
        ));
    }

    #[test]
    fn test_add_without_parent_fails() {
        let mut store = Store::from_snapshot(parse_string(A).unwrap());
        let entry = Entry::new("cn=x,cn=missing,cn=config");
        assert!(matches!(
            store.apply(&Operation::AddEntry(entry)),
            Err(Error::NoSuchEntry(_))
        ));
    }

    #[test]
    fn test_delete_non_leaf_fails() {
        let mut store = Store::from_snapshot(parse_string(A).unwrap());
        let op = Operation::DeleteEntry(Dn::new("cn=gone,cn=plugins,cn=config"));
        assert!(matches!(store.apply(&op), Err(Error::NotLeaf(_))));
    }

    #[test]
    fn test_failed_modify_leaves_entry_untouched() {
        let mut store = Store::from_snapshot(parse_string(A).unwrap());
        let dn = Dn::new("cn=config");
        let op = Operation::Modify {
            dn: dn.clone(),
            mods: vec![
                Modification::replace("nsslapd-port", vec!["1".into()]),
                Modification::delete("nsslapd-referral", vec!["ldap://zzz".into()]),
            ],
        };
        assert!(store.apply(&op).is_err());
        assert_eq!(store.get(&dn).unwrap().first("nsslapd-port"), Some("389"));
    }
}
