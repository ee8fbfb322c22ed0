//! A single configuration record.

use crate::dn::{Dn, normalize_value, values_equal};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One dse.ldif record: a normalized DN and its attributes.
///
/// Attribute names are lower-cased. Each attribute maps to a non-empty,
/// duplicate-free list of values in insertion order; an attribute whose last
/// value is removed disappears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Normalized DN
    pub dn: Dn,
    /// DN as written in the source file
    pub raw_dn: String,
    attrs: BTreeMap<String, Vec<String>>,
    /// Attributes whose values are kept base64-encoded (not valid UTF-8)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    binary: BTreeSet<String>,
}

impl Entry {
    /// Create an entry without attributes.
    pub fn new(raw_dn: &str) -> Self {
        Self {
            dn: Dn::new(raw_dn),
            raw_dn: raw_dn.trim().to_string(),
            attrs: BTreeMap::new(),
            binary: BTreeSet::new(),
        }
    }

    /// Create an entry from attribute/value pairs.
    pub fn with_attrs<I, A, V>(raw_dn: &str, attrs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (A, Vec<V>)>,
        A: AsRef<str>,
        V: Into<String>,
    {
        let mut entry = Self::new(raw_dn);
        for (attr, values) in attrs {
            for value in values {
                entry.add_value(attr.as_ref(), value)?;
            }
        }
        Ok(entry)
    }

    /// Append a value, rejecting duplicates.
    pub fn add_value(&mut self, attr: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let values = self.attrs.entry(attr.to_lowercase()).or_default();
        if values.iter().any(|v| values_equal(v, &value)) {
            return Err(Error::DuplicateValue {
                dn: self.dn.to_string(),
                attr: attr.to_lowercase(),
                value,
            });
        }
        values.push(value);
        Ok(())
    }

    /// Remove one value. Returns whether it was present.
    pub fn remove_value(&mut self, attr: &str, value: &str) -> bool {
        let key = attr.to_lowercase();
        let Some(values) = self.attrs.get_mut(&key) else {
            return false;
        };
        let before = values.len();
        values.retain(|v| !values_equal(v, value));
        let removed = values.len() < before;
        if values.is_empty() {
            self.attrs.remove(&key);
            self.binary.remove(&key);
        }
        removed
    }

    /// Replace every value of an attribute. An empty list removes it.
    pub fn replace(&mut self, attr: &str, values: Vec<String>) -> Result<()> {
        self.attrs.remove(&attr.to_lowercase());
        for value in values {
            self.add_value(attr, value)?;
        }
        Ok(())
    }

    /// Remove an attribute entirely. Returns whether it existed.
    pub fn remove_attr(&mut self, attr: &str) -> bool {
        let key = attr.to_lowercase();
        self.binary.remove(&key);
        self.attrs.remove(&key).is_some()
    }

    /// Flag an attribute as holding base64 text for binary values.
    pub fn mark_binary(&mut self, attr: &str) {
        self.binary.insert(attr.to_lowercase());
    }

    pub fn is_binary(&self, attr: &str) -> bool {
        self.binary.contains(&attr.to_lowercase())
    }

    /// All values of an attribute.
    pub fn values(&self, attr: &str) -> Option<&[String]> {
        self.attrs.get(&attr.to_lowercase()).map(Vec::as_slice)
    }

    /// The value of a single-valued attribute (first value otherwise).
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.values(attr).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn has_attr(&self, attr: &str) -> bool {
        self.attrs.contains_key(&attr.to_lowercase())
    }

    /// Whether the attribute holds `value`, compared normalized.
    pub fn has_value(&self, attr: &str, value: &str) -> bool {
        self.values(attr)
            .is_some_and(|values| values.iter().any(|v| values_equal(v, value)))
    }

    /// Whether the attribute holds exactly `values` (order-insensitive).
    pub fn has_same_values(&self, attr: &str, values: &[String]) -> bool {
        let current = self.values(attr).unwrap_or(&[]);
        same_value_set(current, values)
    }

    /// Iterate over (attribute, values) pairs.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Attribute names.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn has_object_class(&self, class: &str) -> bool {
        self.has_value("objectclass", class)
    }
}

/// Compare two value lists as normalized sets.
pub fn same_value_set(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<String> = a.iter().map(|v| normalize_value(v)).collect();
    let mut right: Vec<String> = b.iter().map(|v| normalize_value(v)).collect();
    left.sort();
    right.sort();
    left == right
}
