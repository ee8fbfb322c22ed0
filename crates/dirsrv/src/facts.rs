//! Observed state.
//!
//! Reads every instance the host knows about and rebuilds the entity tree
//! it corresponds to. Options equal to their default are left out, so the
//! result reads like the smallest desired state producing the same
//! configuration. Configuration no option covers is reported as `dse_mods`
//! relative to the factory defaults.

use crate::behavior::{Scope, stored_dn};
use crate::error::Result;
use crate::host::DirectoryHost;
use crate::model::{Entity, EntityTree};
use crate::schema::{
    BACKEND_DN, DEFAULT_INDEXES_DN, EntityKind, LDBM_DATABASE_DN, MAPPING_TREE_DN, REPLICA_DN,
    Vars,
};
use declarative::{NodeId, Value};
use dse::entry::same_value_set;
use dse::{Dn, Entry, KnownClass, Snapshot, diff};

/// Everything [`observe`] needs about one instance
struct Observed<'a> {
    host: &'a dyn DirectoryHost,
    snapshot: &'a Snapshot,
    defaults: &'a Snapshot,
}

impl Observed<'_> {
    /// Entity with the options whose observed value is worth recording.
    fn entity(&self, kind: EntityKind, name: &str, vars: &Vars) -> Entity {
        let mut entity = Entity::new(kind, name);
        let placeholder = Entity::new(kind, name);
        let scope = Scope {
            host: self.host,
            vars,
            snapshot: Some(self.snapshot),
            defaults: Some(self.defaults),
            desired: &placeholder,
        };
        for option in kind.options() {
            let Some(value) = option.behavior.fact(option, &scope) else {
                continue;
            };
            let record = match option.behavior.default(option, &scope) {
                _ if option.name == "state" => true,
                Some(default) => !default.matches(&value),
                None => true,
            };
            if record {
                entity.set(option.name, value);
            }
        }
        entity
    }
}

/// Observed state of every instance on the host.
pub fn observe(host: &dyn DirectoryHost) -> Result<EntityTree> {
    let mut root = Entity::new(EntityKind::Root, "");
    let prefix = host.prefix().to_string_lossy().to_string();
    if !prefix.is_empty() {
        root.set("prefix", Value::text(prefix.clone()));
    }
    root.set("state", Value::text("present"));
    let mut tree = EntityTree::new(root);
    let root_id = tree.root();
    let vars = Vars::new(&prefix);

    for name in host.instances()? {
        let Some(snapshot) = host.snapshot(&name)? else {
            continue;
        };
        let defaults = host.default_snapshot(&name)?;
        let instance_vars = vars.child(EntityKind::Instance, &name);
        observe_instance(host, &mut tree, root_id, &instance_vars, &snapshot, &defaults);
    }

    Ok(tree)
}

/// Observed state of one instance, `None` when it does not exist.
pub fn observe_one(host: &dyn DirectoryHost, name: &str) -> Result<Option<EntityTree>> {
    let Some(snapshot) = host.snapshot(name)? else {
        return Ok(None);
    };
    let defaults = host.default_snapshot(name)?;
    let prefix = host.prefix().to_string_lossy().to_string();
    let mut tree = EntityTree::new(Entity::new(EntityKind::Root, ""));
    let root = tree.root();
    let vars = Vars::new(&prefix).child(EntityKind::Instance, name);
    observe_instance(host, &mut tree, root, &vars, &snapshot, &defaults);
    Ok(Some(tree))
}

fn observe_instance(
    host: &dyn DirectoryHost,
    tree: &mut EntityTree,
    parent: NodeId,
    vars: &Vars,
    snapshot: &Snapshot,
    defaults: &Snapshot,
) {
    let observed = Observed {
        host,
        snapshot,
        defaults,
    };
    let name = vars.instance();
    let mut instance = observed.entity(EntityKind::Instance, name, vars);
    let backends = backends(snapshot);

    let mut mods = diff(snapshot, defaults);
    for (backend_name, suffix) in &backends {
        let be_vars = vars
            .child(EntityKind::Backend, backend_name)
            .with_suffix(suffix.clone());
        for template in [BACKEND_DN, MAPPING_TREE_DN] {
            let base = be_vars.dn(template);
            mods.retain(|c| c.dn() != &base && !c.dn().is_descendant_of(&base));
        }
    }
    for option in EntityKind::Instance.options() {
        if let (Some(dn), Some(attr)) = (stored_dn(option, vars), option.attr()) {
            mods.remove_attr(&dn, attr);
        }
    }
    if !mods.is_empty() {
        instance.dse_mods = Some(mods);
    }
    let instance_id = tree.add_child(parent, instance);

    for (backend_name, suffix) in &backends {
        let be_vars = vars
            .child(EntityKind::Backend, backend_name)
            .with_suffix(suffix.clone());
        let backend = observed.entity(EntityKind::Backend, backend_name, &be_vars);
        let backend_id = tree.add_child(instance_id, backend);

        let index_parent = Dn::new(&format!("cn=index,{}", be_vars.resolve(BACKEND_DN)));
        for entry in snapshot.entries_of(KnownClass::NsIndex) {
            if entry.dn.parent().as_ref() != Some(&index_parent) || is_default_index(entry, snapshot) {
                continue;
            }
            let Some(index_name) = entry.first("cn") else {
                continue;
            };
            let index_vars = be_vars.child(EntityKind::Index, index_name);
            let index = observed.entity(EntityKind::Index, index_name, &index_vars);
            tree.add_child(backend_id, index);
        }

        if suffix.is_some() {
            let replica = be_vars.dn(REPLICA_DN);
            for entry in snapshot.entries_of(KnownClass::NsDs5ReplicationAgreement) {
                if entry.dn.parent().as_ref() != Some(&replica) {
                    continue;
                }
                let Some(agreement_name) = entry.first("cn") else {
                    continue;
                };
                let agreement_vars = be_vars.child(EntityKind::Agreement, agreement_name);
                let agreement = observed.entity(EntityKind::Agreement, agreement_name, &agreement_vars);
                tree.add_child(backend_id, agreement);
            }
        }
    }
}

/// Backend names and suffixes, in DN order.
fn backends(snapshot: &Snapshot) -> Vec<(String, Option<String>)> {
    let parent = Dn::new(LDBM_DATABASE_DN);
    snapshot
        .entries_of(KnownClass::NsBackendInstance)
        .filter(|e| e.dn.parent().as_ref() == Some(&parent))
        .filter_map(|e| {
            let name = e.first("cn")?.to_string();
            Some((name, e.first("nsslapd-suffix").map(ToString::to_string)))
        })
        .collect()
}

/// Whether an index entry only mirrors a default or system index.
fn is_default_index(entry: &Entry, snapshot: &Snapshot) -> bool {
    if entry.first("nssystemindex").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return true;
    }
    let Some(name) = entry.first("cn") else {
        return false;
    };
    let default_dn = Dn::new(&format!("cn={},{DEFAULT_INDEXES_DN}", dse::escape_value(name)));
    let Some(default) = snapshot.get_dn(&default_dn) else {
        return false;
    };
    ["nsindextype", "nsmatchingrule"].iter().all(|attr| {
        same_value_set(
            entry.values(attr).unwrap_or_default(),
            default.values(attr).unwrap_or_default(),
        )
    })
}
