//! Entity model shared by desired and observed state.
//!
//! Both sides of a comparison are [`EntityTree`]s: a root with instances,
//! instances with backends, backends with indexes and agreements. Each node
//! holds canonical option values keyed by option name.

use crate::schema::EntityKind;
use declarative::{EntityState, NodeId, Tree, Value, ValueKind};
use dse::{DiffResult, MASK};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

/// Tree of entities rooted at the host
pub type EntityTree = Tree<Entity>;

/// One configurable object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    pub values: BTreeMap<String, Value>,
    /// Raw configuration changes relative to the factory defaults
    pub dse_mods: Option<DiffResult>,
}

impl Entity {
    pub fn new(kind: EntityKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            values: BTreeMap::new(),
            dse_mods: None,
        }
    }

    /// An entity known not to exist.
    pub fn absent(kind: EntityKind, name: &str) -> Self {
        let mut entity = Self::new(kind, name);
        entity.set("state", Value::text("absent"));
        entity
    }

    pub fn get(&self, option: &str) -> Option<&Value> {
        self.values.get(option)
    }

    pub fn set(&mut self, option: &str, value: Value) {
        self.values.insert(option.to_string(), value);
    }

    /// Lifecycle state, `present` when unset.
    pub fn state(&self) -> EntityState {
        self.get("state")
            .and_then(Value::first)
            .and_then(|s| s.parse().ok())
            .unwrap_or(EntityState::Present)
    }

    pub fn exists(&self) -> bool {
        !self.state().is_absent()
    }

    /// Whether `name` designates this entity.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// `instance i1`, `backend userroot`; the root has no label.
    pub fn label(&self) -> String {
        match self.kind {
            EntityKind::Root => String::new(),
            kind => format!("{kind} {}", self.name),
        }
    }
}

/// Display path of a node, e.g. `instance i1 / backend userroot`.
pub fn path(tree: &EntityTree, id: NodeId) -> String {
    let labels: Vec<String> = tree
        .path(id)
        .into_iter()
        .map(|n| tree.get(n).label())
        .filter(|l| !l.is_empty())
        .collect();
    if labels.is_empty() {
        "root".to_string()
    } else {
        labels.join(" / ")
    }
}

/// Find a child entity by kind and name.
pub fn find_child(tree: &EntityTree, parent: NodeId, kind: EntityKind, name: &str) -> Option<NodeId> {
    tree.find_child(parent, |e| e.kind == kind && e.is_named(name))
}

// ============================================================================
// Nested Records
// ============================================================================

/// Nested record of a subtree: option values, then child collections keyed
/// by entity name.
///
/// Hidden values are masked and boolean options are rendered as JSON
/// booleans. The record has the same shape as desired-state input.
pub fn to_record(tree: &EntityTree, id: NodeId) -> Json {
    let entity = tree.get(id);
    let mut record = Map::new();

    if entity.kind != EntityKind::Root {
        record.insert("name".to_string(), Json::String(entity.name.clone()));
    }
    for (name, value) in &entity.values {
        let option = entity.kind.option(name);
        let json = match option {
            Some(o) if o.hidden => Json::String(MASK.to_string()),
            Some(o) if o.kind == ValueKind::Bool => Json::Bool(value.is_true()),
            _ => match value {
                Value::Text(t) => Json::String(t.clone()),
                Value::List(items) => Json::Array(items.iter().cloned().map(Json::String).collect()),
            },
        };
        record.insert(name.clone(), json);
    }
    if let Some(mods) = entity.dse_mods.as_ref().filter(|m| !m.is_empty())
        && let Ok(json) = serde_json::to_value(mods)
    {
        record.insert("dse_mods".to_string(), json);
    }

    for child in entity.kind.children() {
        let mut children = Map::new();
        for child_id in tree.children(id) {
            let child_entity = tree.get(child_id);
            if child_entity.kind == child.kind {
                children.insert(child_entity.name.clone(), to_record(tree, child_id));
            }
        }
        if !children.is_empty() {
            record.insert(child.key.to_string(), Json::Object(children));
        }
    }

    Json::Object(record)
}
