//! Replication topology checks on desired state.
//!
//! These run before anything is written so an inconsistent topology never
//! leaves an instance half converged.

use crate::error::{Error, Result};
use crate::model::{Entity, EntityTree, path};
use crate::replica::Role;
use crate::schema::EntityKind;
use declarative::{NodeId, Value};
use std::collections::BTreeMap;

const MAX_REPLICA_ID: u32 = 65534;

/// Desired role of a backend, when it has an opinion.
pub fn desired_role(backend: &Entity) -> Option<Role> {
    backend
        .get("replicarole")
        .and_then(Value::first)
        .and_then(Role::from_option)
}

/// Check every backend of the desired tree.
pub fn validate(tree: &EntityTree) -> Result<()> {
    // (suffix, replica id) -> first backend using it
    let mut ids: BTreeMap<(String, u32), String> = BTreeMap::new();

    for id in tree.walk(tree.root()) {
        let backend = tree.get(id);
        if backend.kind != EntityKind::Backend || !backend.exists() {
            continue;
        }
        let here = path(tree, id);
        let Some(role) = desired_role(backend) else {
            continue;
        };
        let replica_id = backend.get("replicaid").and_then(Value::first);

        match (role, replica_id) {
            (Role::Supplier, None) => {
                return Err(Error::invalid(&here, "replicaid is required for a supplier"));
            }
            (Role::Supplier, Some(rid)) => {
                let rid = parse_replica_id(&here, rid)?;
                let suffix = backend
                    .get("suffix")
                    .and_then(Value::first)
                    .map(|s| dse::Dn::new(s).to_string())
                    .unwrap_or_default();
                if let Some(other) = ids.insert((suffix.clone(), rid), here.clone()) {
                    return Err(Error::invalid(
                        &here,
                        format!("replicaid {rid} on suffix {suffix} is already used by {other}"),
                    ));
                }
            }
            (Role::Hub | Role::Consumer, Some(_)) => {
                return Err(Error::invalid(
                    &here,
                    format!("replicaid cannot be set on a {role}"),
                ));
            }
            _ => {}
        }

        if matches!(role, Role::Standalone | Role::Consumer) && has_agreements(tree, id) {
            return Err(Error::invalid(
                &here,
                format!("a {role} cannot have replication agreements"),
            ));
        }
    }
    Ok(())
}

fn parse_replica_id(path: &str, rid: &str) -> Result<u32> {
    match rid.trim().parse::<u32>() {
        Ok(n) if (1..=MAX_REPLICA_ID).contains(&n) => Ok(n),
        _ => Err(Error::invalid(
            path,
            format!("replicaid must be between 1 and {MAX_REPLICA_ID}, got '{rid}'"),
        )),
    }
}

fn has_agreements(tree: &EntityTree, backend: NodeId) -> bool {
    tree.children(backend)
        .into_iter()
        .any(|c| tree.get(c).kind == EntityKind::Agreement && tree.get(c).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(backends: &[(&str, &str, &[(&str, &str)])]) -> EntityTree {
        let mut tree = EntityTree::new(Entity::new(EntityKind::Root, ""));
        for (instance, backend, values) in backends {
            let parent = crate::model::find_child(&tree, tree.root(), EntityKind::Instance, instance)
                .unwrap_or_else(|| tree.add_child(tree.root(), Entity::new(EntityKind::Instance, instance)));
            let mut entity = Entity::new(EntityKind::Backend, backend);
            entity.set("suffix", Value::text("dc=example,dc=com"));
            for (k, v) in *values {
                entity.set(k, Value::text(*v));
            }
            tree.add_child(parent, entity);
        }
        tree
    }

    #[test]
    fn test_supplier_needs_replica_id() {
        let t = tree(&[("i1", "userroot", &[("replicarole", "supplier")])]);
        let err = validate(&t).unwrap_err();
        assert_eq!(
            err.to_string(),
            "instance i1 / backend userroot: replicaid is required for a supplier"
        );
    }

    #[test]
    fn test_duplicate_replica_id_on_suffix() {
        let t = tree(&[
            ("i1", "userroot", &[("replicarole", "supplier"), ("replicaid", "1")]),
            ("i2", "userroot", &[("replicarole", "supplier"), ("replicaid", "1")]),
        ]);
        assert!(validate(&t).unwrap_err().to_string().contains("already used"));

        let t = tree(&[
            ("i1", "userroot", &[("replicarole", "supplier"), ("replicaid", "1")]),
            ("i2", "userroot", &[("replicarole", "supplier"), ("replicaid", "2")]),
        ]);
        assert!(validate(&t).is_ok());
    }

    #[test]
    fn test_replica_id_range_and_roles() {
        let t = tree(&[("i1", "userroot", &[("replicarole", "supplier"), ("replicaid", "65535")])]);
        assert!(validate(&t).is_err());
        let t = tree(&[("i1", "userroot", &[("replicarole", "consumer"), ("replicaid", "3")])]);
        assert!(validate(&t).is_err());
    }

    #[test]
    fn test_consumer_cannot_have_agreements() {
        let mut t = tree(&[("i1", "userroot", &[("replicarole", "consumer")])]);
        let i1 = t.children(t.root())[0];
        let be = t.children(i1)[0];
        t.add_child(be, Entity::new(EntityKind::Agreement, "to-i2"));
        assert!(validate(&t).unwrap_err().to_string().contains("agreements"));
    }
}
