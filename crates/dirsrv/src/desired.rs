//! Desired-state input.
//!
//! A desired state is a nested document: the root carries `prefix`, `state`
//! and `instances`; instances carry options, `dse_mods` and `backends`;
//! backends carry `indexes` and `agmts`. Child collections are given either
//! as a list of records with a `name` or as a map keyed by name. The same
//! document can be written in YAML, JSON or TOML.
//!
//! Loading is strict: unknown fields are errors, values are checked against
//! the option tables and required options must be present.

use crate::error::{Error, Result};
use crate::model::{Entity, EntityTree, find_child};
use crate::schema::{EntityKind, check_tables};
use crate::topology;
use declarative::{NodeId, Value};
use dse::{DiffResult, MASK};
use serde_json::{Map, Value as Json};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Outcome of checking the option tables, computed once.
static TABLES: LazyLock<std::result::Result<(), String>> = LazyLock::new(check_tables);

/// Keys accepted for compatibility and ignored.
const SKIPPED_KEYS: &[&str] = &["tag", "ds389_agmts"];

/// Document format of a desired-state file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    /// Format implied by a file extension, YAML when unknown.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("json") => Self::Json,
            Some("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        })
    }
}

/// A validated desired-state tree
#[derive(Debug, Clone)]
pub struct DesiredState {
    tree: EntityTree,
}

impl DesiredState {
    /// Read a desired-state file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, Format::from_path(path))
    }

    /// Parse a desired-state document.
    pub fn parse(content: &str, format: Format) -> Result<Self> {
        let document: Json = match format {
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| Error::Input(e.to_string()))?,
            Format::Json => serde_json::from_str(content).map_err(|e| Error::Input(e.to_string()))?,
            Format::Toml => toml::from_str(content).map_err(|e| Error::Input(e.to_string()))?,
        };
        Self::from_json(&document)
    }

    /// Build the tree from an already decoded document.
    pub fn from_json(document: &Json) -> Result<Self> {
        if let Err(message) = &*TABLES {
            return Err(Error::Input(format!("option tables are inconsistent: {message}")));
        }
        let mut tree = EntityTree::new(Entity::new(EntityKind::Root, ""));
        let root = tree.root();
        let Json::Object(record) = document else {
            return Err(Error::Input("the document must be a map".to_string()));
        };
        fill(&mut tree, root, record)?;
        Ok(Self { tree })
    }

    /// Wrap an existing tree, e.g. observed facts fed back as desired state.
    pub fn from_tree(tree: EntityTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    /// Installation prefix given in the document.
    pub fn prefix(&self) -> Option<&str> {
        self.tree
            .get(self.tree.root())
            .get("prefix")
            .and_then(Value::first)
    }

    /// Check cross-entity consistency.
    pub fn validate(&self) -> Result<()> {
        topology::validate(&self.tree)
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn label(kind: EntityKind, name: &str) -> String {
    format!("{kind} {name}")
}

fn node_path(tree: &EntityTree, id: NodeId) -> String {
    crate::model::path(tree, id)
}

/// Fill the entity at `id` from its record.
fn fill(tree: &mut EntityTree, id: NodeId, record: &Map<String, Json>) -> Result<()> {
    let kind = tree.get(id).kind;
    let path = node_path(tree, id);

    for (raw_key, raw_value) in record {
        let key = raw_key.to_lowercase();
        if key == "name" || key.starts_with('_') || raw_value.is_null() {
            continue;
        }
        if SKIPPED_KEYS.contains(&key.as_str()) {
            if key != "tag" {
                log::warn!("{path}: {key} is not supported, ignoring it");
            }
            continue;
        }

        if key == "dse_mods" && kind == EntityKind::Instance {
            let mods: DiffResult = serde_json::from_value(raw_value.clone())
                .map_err(|e| Error::invalid(&path, format!("invalid dse_mods: {e}")))?;
            tree.get_mut(id).dse_mods = Some(mods);
            continue;
        }

        if let Some(child) = kind.child(&key) {
            add_children(tree, id, child.kind, raw_value, &path)?;
            continue;
        }

        let Some(option) = kind.option(&key) else {
            return Err(declarative::Error::UnknownField {
                path,
                field: raw_key.clone(),
            }
            .into());
        };
        let value: Value = serde_json::from_value(raw_value.clone())
            .map_err(|e| Error::invalid(&path, format!("invalid value for {}: {e}", option.name)))?;
        if option.hidden && value.first() == Some(MASK) {
            log::debug!("{path}: {} is masked, leaving it unmanaged", option.name);
            continue;
        }
        let value = option.behavior.normalize(option.check(&path, value)?);
        tree.get_mut(id).set(option.name, value);
    }

    let entity = tree.get_mut(id);
    if entity.get("state").is_none() {
        entity.set("state", Value::text("present"));
    }
    if entity.exists() {
        for option in kind.options().iter().filter(|o| o.required) {
            if entity.get(option.name).is_none() {
                return Err(declarative::Error::MissingField {
                    path,
                    field: option.name.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Add a child collection given as a list or as a map keyed by name.
fn add_children(
    tree: &mut EntityTree,
    parent: NodeId,
    kind: EntityKind,
    value: &Json,
    path: &str,
) -> Result<()> {
    let records: Vec<(Option<&str>, &Json)> = match value {
        Json::Array(items) => items.iter().map(|item| (None, item)).collect(),
        Json::Object(map) => map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect(),
        _ => {
            return Err(Error::invalid(
                path,
                format!("{kind} entries must be a list or a map"),
            ));
        }
    };

    for (key, record) in records {
        let Json::Object(record) = record else {
            return Err(Error::invalid(path, format!("each {kind} must be a map")));
        };
        let name = record
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("name"))
            .and_then(|(_, v)| scalar(v))
            .or_else(|| key.map(ToString::to_string));
        let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
            return Err(declarative::Error::MissingField {
                path: format!("{path} / {kind}"),
                field: "name".to_string(),
            }
            .into());
        };
        if find_child(tree, parent, kind, &name).is_some() {
            return Err(Error::invalid(path, format!("duplicate {}", label(kind, &name))));
        }
        let id = tree.add_child(parent, Entity::new(kind, name.trim()));
        fill(tree, id, record)?;
    }
    Ok(())
}

fn scalar(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::to_record;

    const SAMPLE: &str = r"
prefix: /opt/ds
instances:
  - name: i1
    port: 3389
    rootpw: secret12
    started: yes
    backends:
      userroot:
        suffix: dc=example, dc=com
        readonly: true
        indexes:
          - name: employeeNumber
            indextype: [eq, pres]
";

    fn instance(state: &DesiredState) -> &Entity {
        let tree = state.tree();
        tree.get(tree.children(tree.root())[0])
    }

    #[test]
    fn test_parse_yaml_sample() {
        let state = DesiredState::parse(SAMPLE, Format::Yaml).unwrap();
        assert_eq!(state.prefix(), Some("/opt/ds"));
        let i1 = instance(&state);
        assert_eq!(i1.name, "i1");
        assert_eq!(i1.get("port"), Some(&Value::text("3389")));
        assert_eq!(i1.get("started"), Some(&Value::text("true")));
        assert_eq!(i1.get("state"), Some(&Value::text("present")));

        let tree = state.tree();
        let i1_id = tree.children(tree.root())[0];
        let be = tree.get(tree.children(i1_id)[0]);
        assert_eq!(be.name, "userroot");
        assert_eq!(be.get("suffix"), Some(&Value::text("dc=example,dc=com")));
        assert_eq!(be.get("readonly"), Some(&Value::text("on")));
    }

    #[test]
    fn test_aliases_and_skipped_keys() {
        let json = r#"{
            "ds389_prefix": "/opt/ds",
            "tag": "x",
            "ds389_agmts": [],
            "ds389_server_instances": [{"name": "i1", "_comment": "ignored", "port": null}]
        }"#;
        let state = DesiredState::parse(json, Format::Json).unwrap();
        assert_eq!(state.prefix(), Some("/opt/ds"));
        assert_eq!(instance(&state).name, "i1");
        assert!(instance(&state).get("port").is_none());
    }

    #[test]
    fn test_toml_input() {
        let doc = r#"
[[instances]]
name = "i1"
port = 3389
"#;
        let state = DesiredState::parse(doc, Format::Toml).unwrap();
        assert_eq!(instance(&state).get("port"), Some(&Value::text("3389")));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = DesiredState::parse("instances: [{name: i1, colour: blue}]", Format::Yaml).unwrap_err();
        assert_eq!(err.to_string(), "instance i1: unknown field 'colour'");
        assert_eq!(err.category(), crate::error::ErrorCategory::Schema);
    }

    #[test]
    fn test_missing_name_and_required() {
        let err = DesiredState::parse("instances: [{port: 1}]", Format::Yaml).unwrap_err();
        assert!(err.to_string().contains("missing required field 'name'"));

        let err = DesiredState::parse(
            "instances: [{name: i1, backends: [{name: userroot}]}]",
            Format::Yaml,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "instance i1 / backend userroot: missing required field 'suffix'"
        );

        // Absent entities need no required options.
        assert!(
            DesiredState::parse(
                "instances: [{name: i1, backends: [{name: userroot, state: absent}]}]",
                Format::Yaml,
            )
            .is_ok()
        );
    }

    #[test]
    fn test_invalid_choice() {
        let err = DesiredState::parse(
            "instances: [{name: i1, backends: [{name: b, suffix: dc=x, replicarole: leader}]}]",
            Format::Yaml,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid value 'leader' for replicarole"));
    }

    #[test]
    fn test_masked_values_left_unmanaged() {
        let state = DesiredState::parse("instances: [{name: i1, rootpw: '******'}]", Format::Yaml).unwrap();
        assert!(instance(&state).get("rootpw").is_none());
    }

    #[test]
    fn test_dse_mods_input() {
        let doc = r#"{"instances": [{"name": "i1", "dse_mods": {
            "cn=config": {"replace-value": {"nsslapd-sizelimit": ["500"]}}
        }}]}"#;
        let state = DesiredState::parse(doc, Format::Json).unwrap();
        let mods = instance(&state).dse_mods.as_ref().unwrap();
        assert_eq!(mods.len(), 1);
    }

    #[test]
    fn test_record_round_trip() {
        let state = DesiredState::parse(SAMPLE, Format::Yaml).unwrap();
        let record = to_record(state.tree(), state.tree().root());
        let again = DesiredState::from_json(&record).unwrap();
        let i1 = instance(&again);
        assert_eq!(i1.get("port"), Some(&Value::text("3389")));
        // The masked password is not carried over.
        assert!(i1.get("rootpw").is_none());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a.TOML")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("a.yml")), Format::Yaml);
    }
}
