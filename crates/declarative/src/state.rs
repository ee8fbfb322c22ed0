//! Entity lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Desired or observed lifecycle state of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    /// Exists, children not listed are left alone
    Present,
    /// Only reconcile attributes of existing entities
    Updated,
    /// Must not exist
    Absent,
    /// Like present, also removing attributes not mentioned
    Overwrite,
}

/// Lifecycle decision for one entity in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create,
    Delete,
    /// Exists and should: reconcile attributes
    Reconcile,
    Nothing,
}

impl EntityState {
    pub const CHOICES: &'static [&'static str] = &["present", "updated", "absent"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Updated => "updated",
            Self::Absent => "absent",
            Self::Overwrite => "overwrite",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Decide what to do given whether the entity currently exists.
    pub fn transition(&self, exists: bool) -> Transition {
        match (self, exists) {
            (Self::Absent, true) => Transition::Delete,
            (Self::Absent, false) => Transition::Nothing,
            (_, false) => Transition::Create,
            (_, true) => Transition::Reconcile,
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "updated" => Ok(Self::Updated),
            "absent" => Ok(Self::Absent),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(format!("unknown state '{other}'")),
        }
    }
}
