//! Reconciliation of desired state against a directory host.
//!
//! The reconciler walks the desired tree depth first. For every entity it
//! reads a fresh snapshot, rebuilds the observed option values, plans the
//! actions that differ and runs each one through its behavior: skip when the
//! change is not real, describe, stage write operations, apply host-level
//! side effects. Staged operations are filtered against the live
//! configuration before they are written, so a second pass over the same
//! desired state writes nothing.
//!
//! Backends run two extra steps after their options: the replica role
//! transition and the replication manager account.

use crate::behavior::{ApplyScope, DsAction, Scope, stored_dn};
use crate::desired::DesiredState;
use crate::error::{Error, Result};
use crate::host::{DirectoryHost, write_or_update};
use crate::model::{Entity, EntityTree, path};
use crate::replica::{ReplicaScope, Role, after, describe, plan_transition, replication_manager};
use crate::schema::{BACKEND_DN, EntityKind, Vars};
use crate::topology;
use declarative::{ApplyContext, ChangeSummary, EntityState, NodeId, Value, plan};
use dse::{ModKind, Modification, Operation, Snapshot};
use std::collections::BTreeMap;

/// Drives one or more reconciliation passes against a host.
pub struct Reconciler<'h> {
    host: &'h mut dyn DirectoryHost,
    summary: ChangeSummary,
}

/// One entity being converged
struct Pass<'a> {
    desired: &'a Entity,
    vars: &'a Vars,
    defaults: &'a Snapshot,
    /// Whether the entity existed before the pass
    existed: bool,
    /// Whether the instance was running before the pass
    online: bool,
}

impl<'h> Reconciler<'h> {
    pub fn new(host: &'h mut dyn DirectoryHost) -> Self {
        Self {
            host,
            summary: ChangeSummary::new(),
        }
    }

    /// Changes reported by the last pass, complete or not.
    pub fn summary(&self) -> &ChangeSummary {
        &self.summary
    }

    /// Converge the host towards `desired`.
    ///
    /// The desired tree is validated first; nothing is written when it is
    /// inconsistent. On error the changes made so far stay in
    /// [`summary`](Self::summary).
    pub fn update(&mut self, desired: &DesiredState, ctx: &mut ApplyContext<'_>) -> Result<ChangeSummary> {
        self.summary = ChangeSummary::new();
        desired.validate()?;

        let tree = desired.tree();
        let root = tree.get(tree.root());
        let vars = Vars::new(&self.host.prefix().to_string_lossy());

        if root.state() == EntityState::Absent {
            for name in self.host.instances()? {
                let instance = Entity::absent(EntityKind::Instance, &name);
                let instance_vars = vars.child(EntityKind::Instance, &name);
                self.converge(&instance, &instance_vars, ctx)
                    .map_err(|e| e.at(&instance.label()))?;
            }
            return Ok(self.summary.clone());
        }

        for id in tree.children(tree.root()) {
            self.instance(tree, id, &vars, ctx)
                .map_err(|e| e.at(&path(tree, id)))?;
        }
        Ok(self.summary.clone())
    }

    fn instance(
        &mut self,
        tree: &EntityTree,
        id: NodeId,
        parent_vars: &Vars,
        ctx: &mut ApplyContext<'_>,
    ) -> Result<()> {
        let instance = tree.get(id);
        let vars = parent_vars.child(EntityKind::Instance, &instance.name);
        self.converge(instance, &vars, ctx)?;
        if !instance.exists() {
            return Ok(());
        }

        for backend_id in tree.children(id) {
            self.backend(tree, backend_id, &vars, ctx)
                .map_err(|e| e.at(&path(tree, backend_id)))?;
        }
        Ok(())
    }

    fn backend(
        &mut self,
        tree: &EntityTree,
        id: NodeId,
        instance_vars: &Vars,
        ctx: &mut ApplyContext<'_>,
    ) -> Result<()> {
        let backend = tree.get(id);
        let mut vars = instance_vars.child(EntityKind::Backend, &backend.name);
        let suffix = match backend.get("suffix").and_then(Value::first) {
            Some(suffix) => Some(suffix.to_string()),
            None => self
                .host
                .snapshot(vars.instance())?
                .and_then(|s| s.get_dn(&vars.dn(BACKEND_DN)).and_then(|e| e.first("nsslapd-suffix")).map(ToString::to_string)),
        };
        vars = vars.with_suffix(suffix);

        let existed = self.converge(backend, &vars, ctx)?;
        if !backend.exists() {
            return Ok(());
        }

        self.replica(backend, &vars, existed, ctx)?;
        self.replication_manager(backend, &vars, &path(tree, id), ctx)?;

        for child_id in tree.children(id) {
            let child = tree.get(child_id);
            let child_vars = vars.child(child.kind, &child.name);
            self.converge(child, &child_vars, ctx)
                .map_err(|e| e.at(&path(tree, child_id)))?;
        }
        Ok(())
    }

    // ========================================================================
    // Options
    // ========================================================================

    /// Plan and run the option actions of one entity, then write the
    /// operations they staged. Returns whether the entity existed before.
    fn converge(&mut self, desired: &Entity, vars: &Vars, ctx: &mut ApplyContext<'_>) -> Result<bool> {
        let instance = vars.instance().to_string();
        let defaults = self.host.default_snapshot(&instance)?;
        let snapshot = self.host.snapshot(&instance)?;

        let (existed, observed) = observe(&Scope {
            host: &*self.host,
            vars,
            snapshot: snapshot.as_ref(),
            defaults: Some(&defaults),
            desired,
        });

        let removing = !desired.exists();
        let desired_value = |name: &str| -> Option<Value> {
            let value = desired.get(name)?;
            // `updated` and `overwrite` only differ from `present` in how
            // attributes are written.
            if name == "state" && matches!(desired.state(), EntityState::Updated | EntityState::Overwrite) {
                return Some(Value::text(EntityState::Present.as_str()));
            }
            Some(value.clone())
        };
        let actions = plan(
            desired
                .kind
                .options()
                .iter()
                .filter(|o| o.behavior.actionable() && (!removing || o.name == "state")),
            desired_value,
            |name| observed.get(name).cloned(),
        );

        let pass = Pass {
            desired,
            vars,
            defaults: &defaults,
            existed,
            online: self.host.is_started(&instance),
        };
        let mut ops = Vec::new();
        for action in &actions {
            let snapshot = self.host.snapshot(&instance)?;
            self.run_action(action, &pass, snapshot.as_ref(), &mut ops, ctx)?;
        }

        if removing {
            return Ok(existed);
        }
        if let Some(mods) = &desired.dse_mods {
            ops.extend(mods.operations());
        }
        let snapshot = self.host.snapshot(&instance)?;
        let overwrite = desired.state() == EntityState::Overwrite;
        for op in filter_operations(snapshot.as_ref(), ops, overwrite) {
            if existed {
                report(&mut self.summary, ctx, op.to_string());
            }
            if !ctx.dry_run {
                write_or_update(self.host, &instance, &op)?;
            }
        }

        Ok(existed)
    }

    fn run_action(
        &mut self,
        action: &DsAction,
        pass: &Pass<'_>,
        snapshot: Option<&Snapshot>,
        ops: &mut Vec<Operation>,
        ctx: &mut ApplyContext<'_>,
    ) -> Result<()> {
        let option = action.option;
        let behavior = option.behavior;
        {
            let scope = Scope {
                host: &*self.host,
                vars: pass.vars,
                snapshot,
                defaults: Some(pass.defaults),
                desired: pass.desired,
            };
            if behavior.ignore(action, &scope)? {
                ctx.reporter.debug(&format!("{}: no change needed", option.name));
                return Ok(());
            }
            if option.readonly && pass.existed && pass.online {
                return Err(Error::RequiresOffline {
                    instance: pass.vars.instance().to_string(),
                    dn: stored_dn(option, pass.vars).map(|dn| dn.to_string()).unwrap_or_default(),
                    attr: option.attr().unwrap_or(option.name).to_string(),
                });
            }
            if (!pass.existed || !behavior.staged())
                && let Some(message) = behavior.describe(action, &scope)
            {
                report(&mut self.summary, ctx, message);
            }
            behavior.stage(action, &scope, ops)?;
        }

        if !ctx.dry_run {
            let mut scope = ApplyScope {
                host: &mut *self.host,
                vars: pass.vars,
                snapshot,
                desired: pass.desired,
            };
            behavior.apply(action, &mut scope)?;
        }
        Ok(())
    }

    // ========================================================================
    // Replication
    // ========================================================================

    /// Move the replica of a backend to its desired role.
    ///
    /// Without a desired role the observed one is kept, so replica
    /// properties alone still get synchronized. Each step is filtered and
    /// written against the state left by the previous one.
    fn replica(&mut self, backend: &Entity, vars: &Vars, existed: bool, ctx: &mut ApplyContext<'_>) -> Result<()> {
        let instance = vars.instance().to_string();
        let mut snapshot = self.host.snapshot(&instance)?;
        let from = Role::observe(snapshot.as_ref(), vars);
        let to = topology::desired_role(backend).unwrap_or(from);
        let scope = ReplicaScope {
            backend,
            vars,
            snapshot: snapshot.as_ref(),
        };
        let props_changed = !scope.changed_properties().is_empty();
        if to == Role::Standalone && props_changed && topology::desired_role(backend).is_none() {
            ctx.reporter.warn(&format!(
                "Replica properties of suffix {} ignored: it has no replica",
                vars.suffix()
            ));
        }
        let steps = plan_transition(from, to, scope.replica_id_changed(), props_changed);

        let mut current = from;
        for step in steps {
            let message = describe(step, current, vars.suffix());
            if existed {
                report(&mut self.summary, ctx, message);
            } else {
                ctx.reporter.debug(&message);
            }
            current = after(step, current);

            let mut ops = Vec::new();
            ReplicaScope {
                backend,
                vars,
                snapshot: snapshot.as_ref(),
            }
            .stage(step, &mut ops)?;
            if ctx.dry_run {
                continue;
            }
            for op in filter_operations(snapshot.as_ref(), ops, false) {
                write_or_update(self.host, &instance, &op)?;
            }
            snapshot = self.host.snapshot(&instance)?;
        }
        Ok(())
    }

    fn replication_manager(
        &mut self,
        backend: &Entity,
        vars: &Vars,
        path: &str,
        ctx: &mut ApplyContext<'_>,
    ) -> Result<()> {
        let instance = vars.instance().to_string();
        let snapshot = self.host.snapshot(&instance)?;
        let Some((message, op)) = replication_manager(backend, &*self.host, &instance, snapshot.as_ref(), path)?
        else {
            return Ok(());
        };
        report(&mut self.summary, ctx, message);
        if !ctx.dry_run {
            write_or_update(self.host, &instance, &op)?;
        }
        Ok(())
    }
}

fn report(summary: &mut ChangeSummary, ctx: &mut ApplyContext<'_>, message: String) {
    ctx.reporter.change(&message);
    summary.push(message);
}

/// Whether the entity exists, and the observed values of its options.
///
/// A missing entity only has its state observed; every other option then
/// compares against its default.
fn observe(scope: &Scope<'_>) -> (bool, BTreeMap<&'static str, Value>) {
    let options = scope.desired.kind.options();
    let existed = options
        .iter()
        .find(|o| o.name == "state")
        .and_then(|o| o.behavior.fact(o, scope))
        .is_some_and(|v| !v.matches(&Value::text(EntityState::Absent.as_str())));

    let observed = options
        .iter()
        .filter(|o| existed || o.name == "state")
        .filter_map(|o| {
            let value = o
                .behavior
                .fact(o, scope)
                .or_else(|| o.behavior.default(o, scope))?;
            Some((o.name, value))
        })
        .collect();
    (existed, observed)
}

// ============================================================================
// Operation Filter
// ============================================================================

/// Keep only the operations that would change `snapshot`.
///
/// An add of an existing entry becomes a replace of the attributes whose
/// values differ; with `overwrite` the attributes it does not mention are
/// deleted too. Deletes and modifies of missing entries are dropped, as are
/// modifications that would leave their attribute unchanged. Nothing is kept
/// when the instance itself does not exist.
pub fn filter_operations(snapshot: Option<&Snapshot>, ops: Vec<Operation>, overwrite: bool) -> Vec<Operation> {
    let Some(snapshot) = snapshot else {
        return Vec::new();
    };
    let mut kept = Vec::new();

    for op in ops {
        match op {
            Operation::AddEntry(entry) => {
                let Some(current) = snapshot.get_dn(&entry.dn) else {
                    kept.push(Operation::AddEntry(entry));
                    continue;
                };
                let mut mods: Vec<Modification> = entry
                    .attributes()
                    .filter(|(attr, values)| !current.has_same_values(attr, values))
                    .map(|(attr, values)| Modification::replace(attr, values.to_vec()))
                    .collect();
                if overwrite {
                    mods.extend(
                        current
                            .attribute_names()
                            .filter(|attr| !entry.has_attr(attr))
                            .map(|attr| Modification::delete(attr, Vec::new())),
                    );
                }
                if !mods.is_empty() {
                    kept.push(Operation::Modify {
                        dn: entry.dn.clone(),
                        mods,
                    });
                }
            }
            Operation::DeleteEntry(dn) => {
                if snapshot.contains(&dn) {
                    kept.push(Operation::DeleteEntry(dn));
                }
            }
            Operation::Modify { dn, mods } => {
                let Some(current) = snapshot.get_dn(&dn) else {
                    continue;
                };
                let mods: Vec<Modification> = mods
                    .into_iter()
                    .filter_map(|m| match m.kind {
                        ModKind::Add => {
                            let missing: Vec<String> = m
                                .values
                                .iter()
                                .filter(|v| !current.has_value(&m.attr, v))
                                .cloned()
                                .collect();
                            (!missing.is_empty()).then(|| Modification::add(&m.attr, missing))
                        }
                        ModKind::Delete if m.values.is_empty() => current.has_attr(&m.attr).then_some(m),
                        ModKind::Delete => {
                            let present: Vec<String> = m
                                .values
                                .iter()
                                .filter(|v| current.has_value(&m.attr, v))
                                .cloned()
                                .collect();
                            (!present.is_empty()).then(|| Modification::delete(&m.attr, present))
                        }
                        ModKind::Replace => (!current.has_same_values(&m.attr, &m.values)).then_some(m),
                    })
                    .collect();
                if !mods.is_empty() {
                    kept.push(Operation::Modify { dn, mods });
                }
            }
        }
    }
    kept
}
