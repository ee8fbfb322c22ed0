//! Normalized, immutable view of one dse.ldif file.

use crate::dn::Dn;
use crate::entry::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Server-maintained attributes dropped while reading.
///
/// They change on every write and must never show up in a diff or a fact.
pub const IGNORED_ATTRIBUTES: &[&str] = &[
    "creatorsname",
    "modifiersname",
    "createtimestamp",
    "modifytimestamp",
    "numsubordinates",
    "nsslapd-plugindescription",
    "nsslapd-pluginid",
    "nsslapd-pluginvendor",
    "nsslapd-pluginversion",
    "nsstate",
];

/// Whether an attribute is server-maintained metadata.
pub fn is_ignored_attribute(attr: &str) -> bool {
    IGNORED_ATTRIBUTES.contains(&attr.to_lowercase().as_str())
}

/// Object classes indexed by a snapshot.
///
/// Declaration order matters: an entry carrying several markers lands in the
/// bucket of the last one that matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownClass {
    DirectoryServerFeature,
    NsAccount,
    NsBackendInstance,
    NsContainer,
    NsEncryptionConfig,
    NsEncryptionModule,
    NsIndex,
    NsMappingTree,
    NsDs5Replica,
    NsDs5ReplicationAgreement,
    NsSaslMapping,
    NsSchemaPolicy,
    NsSlapdConfig,
    NsSlapdPlugin,
    NsSnmp,
    PamConfig,
    RootDnPluginConfig,
    /// No known marker matched
    Other,
}

impl KnownClass {
    /// Marker classes in classification order.
    pub const MARKERS: &'static [KnownClass] = &[
        Self::DirectoryServerFeature,
        Self::NsAccount,
        Self::NsBackendInstance,
        Self::NsContainer,
        Self::NsEncryptionConfig,
        Self::NsEncryptionModule,
        Self::NsIndex,
        Self::NsMappingTree,
        Self::NsDs5Replica,
        Self::NsDs5ReplicationAgreement,
        Self::NsSaslMapping,
        Self::NsSchemaPolicy,
        Self::NsSlapdConfig,
        Self::NsSlapdPlugin,
        Self::NsSnmp,
        Self::PamConfig,
        Self::RootDnPluginConfig,
    ];

    /// The objectClass value that marks this class.
    pub fn object_class(&self) -> &'static str {
        match self {
            Self::DirectoryServerFeature => "directoryserverfeature",
            Self::NsAccount => "nsaccount",
            Self::NsBackendInstance => "nsbackendinstance",
            Self::NsContainer => "nscontainer",
            Self::NsEncryptionConfig => "nsencryptionconfig",
            Self::NsEncryptionModule => "nsencryptionmodule",
            Self::NsIndex => "nsindex",
            Self::NsMappingTree => "nsmappingtree",
            Self::NsDs5Replica => "nsds5replica",
            Self::NsDs5ReplicationAgreement => "nsds5replicationagreement",
            Self::NsSaslMapping => "nssaslmapping",
            Self::NsSchemaPolicy => "nsschemapolicy",
            Self::NsSlapdConfig => "nsslapdconfig",
            Self::NsSlapdPlugin => "nsslapdplugin",
            Self::NsSnmp => "nssnmp",
            Self::PamConfig => "pamconfig",
            Self::RootDnPluginConfig => "rootdnpluginconfig",
            Self::Other => "other",
        }
    }

    /// Classify an entry by its objectClass values.
    pub fn classify(entry: &Entry) -> Self {
        Self::MARKERS
            .iter()
            .rev()
            .find(|class| entry.has_object_class(class.object_class()))
            .copied()
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for KnownClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_class())
    }
}

/// A parsed dse.ldif: entries keyed by normalized DN plus a class index.
///
/// Snapshots are never mutated; applying changes produces a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<Dn, Entry>,
    classes: BTreeMap<KnownClass, Vec<Dn>>,
}

impl Snapshot {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from entries, dropping ignored attributes.
    ///
    /// A later entry with an already seen DN replaces the earlier one.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut map = BTreeMap::new();
        for mut entry in entries {
            for attr in IGNORED_ATTRIBUTES {
                entry.remove_attr(attr);
            }
            map.insert(entry.dn.clone(), entry);
        }

        let mut classes: BTreeMap<KnownClass, Vec<Dn>> = BTreeMap::new();
        for (dn, entry) in &map {
            classes
                .entry(KnownClass::classify(entry))
                .or_default()
                .push(dn.clone());
        }

        Self {
            entries: map,
            classes,
        }
    }

    /// Look up an entry by (unnormalized) DN.
    pub fn get(&self, dn: &str) -> Option<&Entry> {
        self.entries.get(&Dn::new(dn))
    }

    pub fn get_dn(&self, dn: &Dn) -> Option<&Entry> {
        self.entries.get(dn)
    }

    pub fn contains(&self, dn: &Dn) -> bool {
        self.entries.contains_key(dn)
    }

    /// Single value of `attr` in entry `dn`.
    pub fn single_value(&self, dn: &str, attr: &str) -> Option<&str> {
        self.get(dn).and_then(|e| e.first(attr))
    }

    /// DNs of the entries classified as `class`.
    pub fn dns_of(&self, class: KnownClass) -> &[Dn] {
        self.classes.get(&class).map_or(&[], Vec::as_slice)
    }

    /// Entries classified as `class`.
    pub fn entries_of(&self, class: KnownClass) -> impl Iterator<Item = &Entry> {
        self.dns_of(class)
            .iter()
            .filter_map(|dn| self.entries.get(dn))
    }

    /// All entries in DN order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// All DNs in order.
    pub fn dns(&self) -> impl Iterator<Item = &Dn> {
        self.entries.keys()
    }

    /// DNs strictly below `base`.
    pub fn descendants(&self, base: &Dn) -> Vec<&Dn> {
        self.entries
            .keys()
            .filter(|dn| dn.is_descendant_of(base))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the snapshot, yielding its entries.
    pub fn into_entries(self) -> impl Iterator<Item = Entry> {
        self.entries.into_values()
    }
}
