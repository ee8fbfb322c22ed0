//! Replica roles and role transitions.
//!
//! A backend is standalone, consumer, hub or supplier. Moving between roles
//! is planned as a short list of steps (demote, delete, create, promote,
//! synchronize) so that each step only touches the replica entry and the
//! changelog in ways the server accepts on a live instance.

use crate::behavior::{READ_ONLY_REPLICA_ID, raw_dn, stored_attributes, stored_value};
use crate::error::{Error, Result};
use crate::host::DirectoryHost;
use crate::model::Entity;
use crate::schema::{CHANGELOG_DN, EntityKind, REPLICA_DN, Vars};
use declarative::Value;
use dse::{Dn, Entry, Modification, Operation, Snapshot};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Replication manager accounts must live directly below `cn=config`.
static REPLMAN_DN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^cn=([^,]*),((?:[^,]*,)*cn=config)$").expect("valid replication manager pattern")
});

// ============================================================================
// Roles
// ============================================================================

/// Replica role, ordered by weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Standalone,
    Consumer,
    Hub,
    Supplier,
}

impl Role {
    /// Parse an option value. `none` means standalone.
    pub fn from_option(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "none" | "standalone" => Some(Self::Standalone),
            "consumer" => Some(Self::Consumer),
            "hub" => Some(Self::Hub),
            "supplier" => Some(Self::Supplier),
            _ => None,
        }
    }

    /// Value of the `replicarole` option for this role.
    pub fn option_value(&self) -> &'static str {
        match self {
            Self::Standalone => "none",
            Self::Consumer => "consumer",
            Self::Hub => "hub",
            Self::Supplier => "supplier",
        }
    }

    pub fn weight(&self) -> u8 {
        *self as u8
    }

    /// `nsds5replicatype` and `nsds5flags` of the replica entry.
    pub fn replica_type(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Standalone => None,
            Self::Consumer => Some(("2", "0")),
            Self::Hub => Some(("2", "1")),
            Self::Supplier => Some(("3", "1")),
        }
    }

    /// Whether the role keeps a changelog.
    pub fn has_changelog(&self) -> bool {
        matches!(self, Self::Hub | Self::Supplier)
    }

    /// Role described by a replica entry.
    pub fn from_entry(entry: &Entry) -> Self {
        match (entry.first("nsds5replicatype"), entry.first("nsds5flags")) {
            (Some("3"), _) => Self::Supplier,
            (Some("2"), Some("1")) => Self::Hub,
            (Some("2"), _) => Self::Consumer,
            _ => Self::Standalone,
        }
    }

    /// Role of the backend whose suffix is in `vars`.
    pub fn observe(snapshot: Option<&Snapshot>, vars: &Vars) -> Self {
        if vars.suffix.is_none() {
            return Self::Standalone;
        }
        snapshot
            .and_then(|s| s.get_dn(&vars.dn(REPLICA_DN)))
            .map_or(Self::Standalone, Self::from_entry)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standalone => "standalone",
            Self::Consumer => "consumer",
            Self::Hub => "hub",
            Self::Supplier => "supplier",
        })
    }
}

// ============================================================================
// Transitions
// ============================================================================

/// One step of a role transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Demote { to: Role },
    Delete,
    Create { to: Role },
    Promote { to: Role },
    Synchronize,
}

/// Steps taking a replica from `from` to `to`.
///
/// A supplier whose replica id changes is first demoted to hub then promoted
/// back, since the id of a live supplier cannot be replaced in place.
pub fn plan_transition(from: Role, to: Role, rid_changed: bool, props_changed: bool) -> Vec<Step> {
    let rid_changed = rid_changed && from == Role::Supplier && to == Role::Supplier;
    let mut steps = Vec::new();

    if rid_changed || to < from {
        let target = if rid_changed {
            Role::Hub
        } else if to == Role::Standalone {
            Role::Consumer
        } else {
            to
        };
        if from > target {
            steps.push(Step::Demote { to: target });
        }
        if to == Role::Standalone {
            steps.push(Step::Delete);
        }
    }

    if rid_changed || to > from {
        steps.push(if from == Role::Standalone {
            Step::Create { to }
        } else {
            Step::Promote { to }
        });
    }

    if from != Role::Standalone && to != Role::Standalone && props_changed {
        steps.push(Step::Synchronize);
    }

    steps
}

/// Role reached after a step.
pub fn after(step: Step, current: Role) -> Role {
    match step {
        Step::Demote { to } | Step::Create { to } | Step::Promote { to } => to,
        Step::Delete => Role::Standalone,
        Step::Synchronize => current,
    }
}

/// Message reported for a step taken from role `current`.
pub fn describe(step: Step, current: Role, suffix: &str) -> String {
    match step {
        Step::Demote { to } => format!("Demote replica for suffix {suffix} from {current} to {to}"),
        Step::Delete => format!("Delete replica for suffix {suffix}"),
        Step::Create { to } => format!("Create replica for suffix {suffix} as {to}"),
        Step::Promote { to } => format!("Promote replica for suffix {suffix} from {current} to {to}"),
        Step::Synchronize => format!("Replica for suffix {suffix} properties are modified."),
    }
}

// ============================================================================
// Step Operations
// ============================================================================

/// What a step needs to know about the backend
pub struct ReplicaScope<'a> {
    pub backend: &'a Entity,
    pub vars: &'a Vars,
    pub snapshot: Option<&'a Snapshot>,
}

impl ReplicaScope<'_> {
    fn replica_dn(&self) -> Dn {
        self.vars.dn(REPLICA_DN)
    }

    fn desired(&self, option: &str) -> Option<&Value> {
        self.backend.get(option)
    }

    /// Replica id to store for `role`.
    fn replica_id(&self, role: Role) -> String {
        match role {
            Role::Supplier => self
                .desired("replicaid")
                .and_then(Value::first)
                .unwrap_or(READ_ONLY_REPLICA_ID)
                .to_string(),
            _ => READ_ONLY_REPLICA_ID.to_string(),
        }
    }

    fn type_mods(&self, role: Role) -> Vec<Modification> {
        let Some((kind, flags)) = role.replica_type() else {
            return Vec::new();
        };
        vec![
            Modification::replace("nsds5replicatype", vec![kind.to_string()]),
            Modification::replace("nsds5flags", vec![flags.to_string()]),
            Modification::replace("nsds5replicaid", vec![self.replica_id(role)]),
        ]
    }

    /// Replica properties that differ from the observed ones.
    pub fn changed_properties(&self) -> Vec<(&'static str, Vec<String>)> {
        EntityKind::Backend
            .options()
            .iter()
            .filter(|o| o.storage.is_some_and(|s| s.dn == REPLICA_DN) && o.name != "replicaid")
            .filter_map(|option| {
                let to = self.desired(option.name)?;
                let from = stored_value(option, self.vars, self.snapshot)
                    .map(|v| option.behavior.normalize(v));
                option
                    .differs(from.as_ref(), to)
                    .then(|| (option.attr().unwrap_or(option.name), to.to_list()))
            })
            .collect()
    }

    /// Whether the desired replica id differs from the observed one.
    pub fn replica_id_changed(&self) -> bool {
        let Some(to) = self.desired("replicaid").and_then(Value::first) else {
            return false;
        };
        self.snapshot
            .and_then(|s| s.get_dn(&self.replica_dn()))
            .and_then(|e| e.first("nsds5replicaid"))
            .is_some_and(|from| from.trim() != to.trim())
    }

    fn changelog_ops(&self, role: Role, ops: &mut Vec<Operation>) -> Result<()> {
        let dn = self.vars.dn(CHANGELOG_DN);
        if !role.has_changelog() || self.snapshot.is_some_and(|s| s.contains(&dn)) {
            return Ok(());
        }
        let mut attrs: Vec<(&str, Vec<String>)> = vec![
            ("objectclass", vec!["top".into(), "extensibleObject".into()]),
            ("cn", vec!["changelog".into()]),
        ];
        attrs.extend(stored_attributes(self.backend, CHANGELOG_DN));
        ops.push(Operation::AddEntry(Entry::with_attrs(
            &self.vars.resolve(CHANGELOG_DN),
            attrs,
        )?));
        Ok(())
    }

    /// Write operations of one step.
    pub fn stage(&self, step: Step, ops: &mut Vec<Operation>) -> Result<()> {
        let dn = self.replica_dn();
        match step {
            Step::Demote { to } => ops.push(Operation::Modify {
                dn,
                mods: self.type_mods(to),
            }),
            Step::Delete => {
                if let Some(snapshot) = self.snapshot {
                    let mut below: Vec<Dn> = snapshot.descendants(&dn).into_iter().cloned().collect();
                    below.sort_by_key(|d| std::cmp::Reverse(d.depth()));
                    ops.extend(below.into_iter().map(Operation::DeleteEntry));
                    let changelog = self.vars.dn(CHANGELOG_DN);
                    ops.push(Operation::DeleteEntry(dn));
                    if snapshot.contains(&changelog) {
                        ops.push(Operation::DeleteEntry(changelog));
                    }
                }
            }
            Step::Create { to } => {
                let Some((kind, flags)) = to.replica_type() else {
                    return Ok(());
                };
                let suffix = self.vars.suffix().to_string();
                let rid = self.replica_id(to);
                let mut attrs: Vec<(&str, Vec<String>)> = vec![
                    (
                        "objectclass",
                        vec!["top".into(), "nsds5replica".into(), "extensibleobject".into()],
                    ),
                    ("cn", vec!["replica".into()]),
                    ("nsds5replicaroot", vec![suffix]),
                    ("nsds5replicatype", vec![kind.into()]),
                    ("nsds5flags", vec![flags.into()]),
                    ("nsds5replicaid", vec![rid]),
                ];
                attrs.extend(
                    stored_attributes(self.backend, REPLICA_DN)
                        .into_iter()
                        .filter(|(attr, _)| *attr != "nsds5replicaid"),
                );
                self.changelog_ops(to, ops)?;
                ops.push(Operation::AddEntry(Entry::with_attrs(&raw_dn(REPLICA_DN, self.vars), attrs)?));
            }
            Step::Promote { to } => {
                self.changelog_ops(to, ops)?;
                let mut mods = self.type_mods(to);
                for option in ["replicabinddn", "replicabinddngroup"] {
                    if let Some(value) = self.desired(option) {
                        mods.push(Modification::replace(&format!("nsds5{option}"), value.to_list()));
                    }
                }
                ops.push(Operation::Modify { dn, mods });
            }
            Step::Synchronize => {
                let mods: Vec<Modification> = self
                    .changed_properties()
                    .into_iter()
                    .map(|(attr, values)| Modification::replace(attr, values))
                    .collect();
                if !mods.is_empty() {
                    ops.push(Operation::Modify { dn, mods });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Replication Manager
// ============================================================================

/// Operation creating or updating the replication manager account named by
/// `replicabinddn`, with its report message.
///
/// Accounts outside `cn=config` are left alone.
pub fn replication_manager(
    backend: &Entity,
    host: &dyn DirectoryHost,
    instance: &str,
    snapshot: Option<&Snapshot>,
    path: &str,
) -> Result<Option<(String, Operation)>> {
    let Some(bind_dn) = backend.get("replicabinddn").and_then(Value::first) else {
        return Ok(None);
    };
    let Some(captures) = REPLMAN_DN.captures(bind_dn) else {
        log::debug!("{path}: {bind_dn} is not below cn=config, not managing it");
        return Ok(None);
    };
    let Some(password) = backend.get("replicacredentials").and_then(Value::first) else {
        return Err(Error::invalid(
            path,
            "replicacredentials is required to manage the replication manager account",
        ));
    };

    let dn = Dn::new(bind_dn);
    match snapshot.and_then(|s| s.get_dn(&dn)) {
        Some(entry) => {
            let changed = if password.starts_with('{') {
                entry.first("userpassword") != Some(password)
            } else {
                !host.check_bind(instance, bind_dn, password)?
            };
            Ok(changed.then(|| {
                (
                    format!("Updating password on entry {bind_dn}"),
                    Operation::modify(dn, Modification::replace("userpassword", vec![password.to_string()])),
                )
            }))
        }
        None => {
            let cn = captures.get(1).map_or("", |m| m.as_str());
            let entry = Entry::with_attrs(
                bind_dn,
                [
                    ("objectclass", vec!["top", "netscapeServer", "nsAccount"]),
                    ("cn", vec![cn]),
                    ("userpassword", vec![password]),
                ],
            )?;
            Ok(Some((format!("Adding entry {bind_dn}"), Operation::AddEntry(entry))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FileHost;
    use crate::template::InstanceTemplate;

    fn vars() -> Vars {
        Vars::new("")
            .child(EntityKind::Instance, "i1")
            .child(EntityKind::Backend, "userroot")
            .with_suffix(Some("dc=example,dc=com".into()))
    }

    #[test]
    fn test_supplier_to_consumer_is_one_demotion() {
        assert_eq!(
            plan_transition(Role::Supplier, Role::Consumer, false, false),
            vec![Step::Demote { to: Role::Consumer }]
        );
    }

    #[test]
    fn test_transitions() {
        assert_eq!(
            plan_transition(Role::Standalone, Role::Supplier, false, false),
            vec![Step::Create { to: Role::Supplier }]
        );
        assert_eq!(
            plan_transition(Role::Supplier, Role::Standalone, false, false),
            vec![Step::Demote { to: Role::Consumer }, Step::Delete]
        );
        assert_eq!(
            plan_transition(Role::Consumer, Role::Standalone, false, false),
            vec![Step::Delete]
        );
        assert_eq!(
            plan_transition(Role::Consumer, Role::Supplier, false, true),
            vec![Step::Promote { to: Role::Supplier }, Step::Synchronize]
        );
        assert_eq!(
            plan_transition(Role::Supplier, Role::Supplier, true, false),
            vec![Step::Demote { to: Role::Hub }, Step::Promote { to: Role::Supplier }]
        );
        assert!(plan_transition(Role::Hub, Role::Hub, true, false).is_empty());
        assert!(plan_transition(Role::Standalone, Role::Standalone, false, true).is_empty());
    }

    #[test]
    fn test_messages_follow_the_current_role() {
        let mut current = Role::Supplier;
        let mut messages = Vec::new();
        for step in plan_transition(Role::Supplier, Role::Supplier, true, false) {
            messages.push(describe(step, current, "dc=example,dc=com"));
            current = after(step, current);
        }
        assert_eq!(
            messages,
            vec![
                "Demote replica for suffix dc=example,dc=com from supplier to hub",
                "Promote replica for suffix dc=example,dc=com from hub to supplier",
            ]
        );
    }

    #[test]
    fn test_role_names() {
        assert_eq!(Role::from_option("none"), Some(Role::Standalone));
        assert_eq!(Role::Standalone.option_value(), "none");
        assert_eq!(Role::Standalone.to_string(), "standalone");
        assert!(Role::Supplier > Role::Hub && Role::Hub > Role::Consumer);
        assert_eq!(Role::Supplier.weight(), 3);
    }

    #[test]
    fn test_create_supplier_adds_changelog_and_replica() {
        let mut backend = Entity::new(EntityKind::Backend, "userroot");
        backend.set("replicaid", Value::text("1"));
        backend.set("replicabinddn", Value::text("cn=replmgr,cn=config"));
        backend.set("changelogmaxage", Value::text("7d"));
        let vars = vars();
        let scope = ReplicaScope {
            backend: &backend,
            vars: &vars,
            snapshot: None,
        };
        let mut ops = Vec::new();
        scope.stage(Step::Create { to: Role::Supplier }, &mut ops).unwrap();
        assert_eq!(ops.len(), 2);
        let Operation::AddEntry(changelog) = &ops[0] else {
            panic!("expected changelog entry");
        };
        assert_eq!(changelog.first("nsslapd-changelogmaxage"), Some("7d"));
        let Operation::AddEntry(replica) = &ops[1] else {
            panic!("expected replica entry");
        };
        assert_eq!(replica.dn, vars.dn(REPLICA_DN));
        assert_eq!(replica.first("nsds5replicaid"), Some("1"));
        assert_eq!(replica.first("nsds5replicatype"), Some("3"));
        assert_eq!(replica.first("nsds5replicabinddn"), Some("cn=replmgr,cn=config"));
    }

    #[test]
    fn test_observe_reads_type_and_flags() {
        let vars = vars();
        let entry = Entry::with_attrs(
            &vars.resolve(REPLICA_DN),
            [("nsds5replicatype", vec!["2"]), ("nsds5flags", vec!["1"])],
        )
        .unwrap();
        let snapshot = Snapshot::from_entries([entry]);
        assert_eq!(Role::observe(Some(&snapshot), &vars), Role::Hub);
        assert_eq!(Role::observe(None, &vars), Role::Standalone);
    }

    #[test]
    fn test_replication_manager_account() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = FileHost::open(dir.path()).unwrap();
        host.create_instance(&InstanceTemplate::new("i1", "")).unwrap();
        let mut backend = Entity::new(EntityKind::Backend, "userroot");
        backend.set("replicabinddn", Value::text("cn=replmgr,cn=config"));

        let err = replication_manager(&backend, &host, "i1", None, "instance i1 / backend userroot")
            .unwrap_err();
        assert!(err.to_string().contains("replicacredentials"));

        backend.set("replicacredentials", Value::text("secret12"));
        let snapshot = host.snapshot("i1").unwrap();
        let (message, op) =
            replication_manager(&backend, &host, "i1", snapshot.as_ref(), "p").unwrap().unwrap();
        assert_eq!(message, "Adding entry cn=replmgr,cn=config");
        host.write("i1", &op).unwrap();

        let snapshot = host.snapshot("i1").unwrap();
        assert!(
            replication_manager(&backend, &host, "i1", snapshot.as_ref(), "p")
                .unwrap()
                .is_none()
        );

        backend.set("replicacredentials", Value::text("changed1"));
        let (message, _) =
            replication_manager(&backend, &host, "i1", snapshot.as_ref(), "p").unwrap().unwrap();
        assert_eq!(message, "Updating password on entry cn=replmgr,cn=config");

        backend.set("replicabinddn", Value::text("uid=replmgr,ou=people,dc=example,dc=com"));
        assert!(
            replication_manager(&backend, &host, "i1", snapshot.as_ref(), "p")
                .unwrap()
                .is_none()
        );
    }
}
