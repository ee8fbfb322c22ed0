//! Per-option action behaviors.
//!
//! Each option table entry points at a static [`ActionBehavior`]. The
//! reconciler drives every action through the same phases: observe the
//! current value, decide whether the action can be skipped, describe it,
//! stage the write operations it implies and finally apply the host-level
//! side effects. Staging is pure so it also runs in check mode.

use crate::error::Result;
use crate::host::{DirectoryHost, write_or_update};
use crate::model::Entity;
use crate::replica::Role;
use crate::schema::{
    AGREEMENT_DN, BACKEND_DN, CONFIG_DN, EntityKind, INDEX_DN, MAPPING_TREE_DN, Vars,
};
use crate::template::InstanceTemplate;
use declarative::{OptionAction, OptionSpec, Value, ValueKind};
use dse::{Dn, Entry, Modification, Operation, Snapshot};

/// Option descriptor of this crate
pub type DsOption = OptionSpec<dyn ActionBehavior>;

/// Planned change of one option
pub type DsAction = OptionAction<dyn ActionBehavior>;

/// Read-only view of the world while an action is planned and staged.
pub struct Scope<'a> {
    pub host: &'a dyn DirectoryHost,
    pub vars: &'a Vars,
    /// Current configuration of the instance, `None` when it does not exist
    pub snapshot: Option<&'a Snapshot>,
    /// Factory defaults of the instance
    pub defaults: Option<&'a Snapshot>,
    /// Desired entity owning the option
    pub desired: &'a Entity,
}

/// Mutable view used when an action has host-level side effects.
pub struct ApplyScope<'a> {
    pub host: &'a mut dyn DirectoryHost,
    pub vars: &'a Vars,
    pub snapshot: Option<&'a Snapshot>,
    pub desired: &'a Entity,
}

/// How one option is observed, compared and changed.
pub trait ActionBehavior: Sync {
    /// Whether desired values of this option produce actions at all
    fn actionable(&self) -> bool {
        true
    }

    /// Whether the change is carried by staged write operations, whose own
    /// messages replace the action description on existing entities
    fn staged(&self) -> bool {
        false
    }

    /// Bring a desired or observed value to the form used for comparison.
    fn normalize(&self, value: Value) -> Value {
        value
    }

    fn describe(&self, _action: &DsAction, _scope: &Scope<'_>) -> Option<String> {
        None
    }

    /// Value the option has when nothing is configured.
    fn default(&self, option: &DsOption, _scope: &Scope<'_>) -> Option<Value> {
        option.default_value()
    }

    /// Observed value, `None` when not set.
    fn fact(&self, _option: &DsOption, _scope: &Scope<'_>) -> Option<Value> {
        None
    }

    /// Feed the option into the template of an instance being created.
    fn stage_template(&self, option: &DsOption, value: &Value, template: &mut InstanceTemplate) {
        if let Some(field) = option.template {
            template.set(field, value);
        }
    }

    /// Whether the action turns out to be a no-op once checked against the
    /// live instance.
    fn ignore(&self, _action: &DsAction, _scope: &Scope<'_>) -> Result<bool> {
        Ok(false)
    }

    /// Append the write operations the action implies.
    fn stage(&self, _action: &DsAction, _scope: &Scope<'_>, _ops: &mut Vec<Operation>) -> Result<()> {
        Ok(())
    }

    /// Perform host-level side effects. Skipped in check mode.
    fn apply(&self, _action: &DsAction, _scope: &mut ApplyScope<'_>) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolved DN of a stored option.
pub fn stored_dn(option: &DsOption, vars: &Vars) -> Option<Dn> {
    option.storage.map(|s| vars.dn(s.dn))
}

/// Values of a stored option read from a snapshot, canonicalized.
pub fn stored_value(option: &DsOption, vars: &Vars, snapshot: Option<&Snapshot>) -> Option<Value> {
    let storage = option.storage?;
    let entry = snapshot?.get_dn(&vars.dn(storage.dn))?;
    let values = entry.values(storage.attr)?;
    let value = match option.kind {
        ValueKind::List => Value::List(values.to_vec()),
        _ => Value::text(values.first()?.clone()),
    };
    Some(option.canonical(value))
}

/// Desired values of the options stored in one DN template, as attributes.
pub fn stored_attributes(entity: &Entity, dn_template: &str) -> Vec<(&'static str, Vec<String>)> {
    entity
        .kind
        .options()
        .iter()
        .filter_map(|option| {
            let storage = option.storage.filter(|s| s.dn == dn_template)?;
            let value = entity.get(option.name)?;
            Some((storage.attr, value.to_list()))
        })
        .collect()
}

fn present(exists: bool) -> Value {
    Value::text(if exists { "present" } else { "absent" })
}

fn removing(action: &DsAction) -> bool {
    action
        .to
        .as_ref()
        .and_then(Value::first)
        .is_some_and(|s| s.eq_ignore_ascii_case("absent"))
}

/// Tidy a DN-valued setting: drop blanks around RDN separators, keep case.
pub fn tidy_dn(raw: &str) -> String {
    if Dn::parse(raw).is_none() {
        return raw.trim().to_string();
    }
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut quoted = false;
    for c in raw.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            ',' | ';' if !quoted => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current.trim().to_string());
    parts
        .iter()
        .map(|rdn| match rdn.split_once('=') {
            Some((t, v)) => format!("{}={}", t.trim(), v.trim()),
            None => rdn.clone(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Entry DN as written: suffix-named RDNs are quoted rather than escaped.
pub fn raw_dn(template: &str, vars: &Vars) -> String {
    match vars.suffix.as_deref() {
        Some(suffix) if template.contains("{suffix}") && !suffix.contains(['"', '\\']) => {
            let quoted = format!("\"{}\"", tidy_dn(suffix));
            template
                .replace("{suffix}", &quoted)
                .replace("{backend}", &dse::escape_value(vars.backend()))
                .replace("{agreement}", &dse::escape_value(vars.agreement.as_deref().unwrap_or_default()))
        }
        _ => vars.resolve(template),
    }
}

/// Delete operations for an entry and everything below it, deepest first.
fn delete_subtree(snapshot: Option<&Snapshot>, base: &Dn) -> Vec<Operation> {
    let Some(snapshot) = snapshot else {
        return Vec::new();
    };
    let mut dns: Vec<Dn> = snapshot.descendants(base).into_iter().cloned().collect();
    if snapshot.contains(base) {
        dns.push(base.clone());
    }
    dns.sort_by_key(|dn| std::cmp::Reverse(dn.depth()));
    dns.into_iter().map(Operation::DeleteEntry).collect()
}

fn write_all(scope: &mut ApplyScope<'_>, ops: &[Operation]) -> Result<()> {
    let instance = scope.vars.instance().to_string();
    for op in ops {
        log::debug!("{instance}: {op}");
        write_or_update(scope.host, &instance, op)?;
    }
    Ok(())
}

// ============================================================================
// Configuration Attributes
// ============================================================================

/// An attribute of a configuration entry, changed with a replace.
pub struct DseAttr {
    pub dn_valued: bool,
}

pub static DSE_ATTR: DseAttr = DseAttr { dn_valued: false };
pub static DSE_DN_ATTR: DseAttr = DseAttr { dn_valued: true };

impl DseAttr {
    fn normalize_value(&self, value: Value) -> Value {
        if !self.dn_valued {
            return value;
        }
        match value {
            Value::Text(t) => Value::Text(tidy_dn(&t)),
            Value::List(items) => Value::List(items.iter().map(|t| tidy_dn(t)).collect()),
        }
    }

    fn describe_set(action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        let storage = action.option.storage?;
        let dn = scope.vars.resolve(storage.dn);
        Some(match &action.to {
            Some(to) if !action.option.hidden => {
                format!("Set {}:{} in {dn}", storage.attr, to.to_list().join(" "))
            }
            _ => format!("Set {} in {dn}", storage.attr),
        })
    }
}

impl ActionBehavior for DseAttr {
    fn staged(&self) -> bool {
        true
    }

    fn normalize(&self, value: Value) -> Value {
        self.normalize_value(value)
    }

    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        Self::describe_set(action, scope)
    }

    fn default(&self, option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        if let Some(default) = option.default {
            return Some(option.canonical(Value::text(scope.vars.resolve(default))));
        }
        stored_value(option, scope.vars, scope.defaults).map(|v| self.normalize_value(v))
    }

    fn fact(&self, option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        stored_value(option, scope.vars, scope.snapshot).map(|v| self.normalize_value(v))
    }

    fn stage(&self, action: &DsAction, scope: &Scope<'_>, ops: &mut Vec<Operation>) -> Result<()> {
        let (Some(storage), Some(to)) = (action.option.storage, &action.to) else {
            return Ok(());
        };
        ops.push(Operation::modify(
            scope.vars.dn(storage.dn),
            Modification::replace(storage.attr, to.to_list()),
        ));
        Ok(())
    }
}

/// Feeds the creation template only.
pub struct TemplateOnly;

pub static TEMPLATE_ONLY: TemplateOnly = TemplateOnly;

impl ActionBehavior for TemplateOnly {
    fn actionable(&self) -> bool {
        false
    }
}

/// Administrator password, compared by binding rather than by value.
pub struct RootPassword;

pub static ROOT_PASSWORD: RootPassword = RootPassword;

impl ActionBehavior for RootPassword {
    fn staged(&self) -> bool {
        true
    }

    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        DseAttr::describe_set(action, scope)
    }

    fn fact(&self, option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        stored_value(option, scope.vars, scope.snapshot)
    }

    fn ignore(&self, action: &DsAction, scope: &Scope<'_>) -> Result<bool> {
        let Some(password) = action.to.as_ref().and_then(Value::first) else {
            return Ok(false);
        };
        // Hashed values are compared as they are.
        if password.starts_with('{') {
            return Ok(false);
        }
        let Some(snapshot) = scope.snapshot else {
            return Ok(false);
        };
        let root_dn = scope
            .desired
            .get("root_dn")
            .and_then(Value::first)
            .map(ToString::to_string)
            .or_else(|| snapshot.single_value(CONFIG_DN, "nsslapd-rootdn").map(ToString::to_string))
            .unwrap_or_else(|| "cn=Directory Manager".to_string());
        scope.host.check_bind(scope.vars.instance(), &root_dn, password)
    }

    fn stage(&self, action: &DsAction, scope: &Scope<'_>, ops: &mut Vec<Operation>) -> Result<()> {
        DSE_ATTR.stage(action, scope, ops)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Instance existence.
pub struct InstanceState;

pub static INSTANCE_STATE: InstanceState = InstanceState;

impl ActionBehavior for InstanceState {
    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        let name = scope.vars.instance();
        Some(if removing(action) {
            format!("Removing instance {name}")
        } else {
            format!("Creating instance slapd-{name}")
        })
    }

    fn fact(&self, _option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        Some(present(scope.snapshot.is_some()))
    }

    fn apply(&self, action: &DsAction, scope: &mut ApplyScope<'_>) -> Result<()> {
        let name = scope.vars.instance().to_string();
        if removing(action) {
            return scope.host.delete_instance(&name);
        }
        let mut template = InstanceTemplate::new(&name, &scope.host.prefix().to_string_lossy());
        for option in EntityKind::Instance.options() {
            if let Some(value) = scope.desired.get(option.name) {
                option.behavior.stage_template(option, value, &mut template);
            }
        }
        scope.host.create_instance(&template)
    }
}

/// Instance run state.
pub struct Started;

pub static STARTED: Started = Started;

impl ActionBehavior for Started {
    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        let name = scope.vars.instance();
        Some(match &action.to {
            Some(to) if to.is_true() => format!("Starting instance slapd-{name}"),
            _ => format!("Stopping instance slapd-{name}"),
        })
    }

    fn fact(&self, _option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        Some(Value::text(scope.host.is_started(scope.vars.instance()).to_string()))
    }

    fn apply(&self, action: &DsAction, scope: &mut ApplyScope<'_>) -> Result<()> {
        let name = scope.vars.instance().to_string();
        match &action.to {
            Some(to) if to.is_true() => scope.host.start(&name),
            _ => scope.host.stop(&name),
        }
    }
}

/// Backend existence: the backend entry and its mapping tree node.
pub struct BackendState;

pub static BACKEND_STATE: BackendState = BackendState;

impl ActionBehavior for BackendState {
    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        let name = &scope.desired.name;
        let suffix = scope.vars.suffix();
        Some(if removing(action) {
            format!("Deleting backend {name} on suffix {suffix}")
        } else {
            format!("Creating backend {name} on suffix {suffix}")
        })
    }

    fn fact(&self, _option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        let dn = scope.vars.dn(BACKEND_DN);
        Some(present(scope.snapshot.is_some_and(|s| s.contains(&dn))))
    }

    fn apply(&self, action: &DsAction, scope: &mut ApplyScope<'_>) -> Result<()> {
        if removing(action) {
            let mut ops = delete_subtree(scope.snapshot, &scope.vars.dn(MAPPING_TREE_DN));
            ops.extend(delete_subtree(scope.snapshot, &scope.vars.dn(BACKEND_DN)));
            return write_all(scope, &ops);
        }

        let name = scope.desired.name.as_str();
        let suffix = scope.vars.suffix().to_string();
        let mut attrs: Vec<(&str, Vec<String>)> = vec![
            (
                "objectclass",
                vec!["top".into(), "extensibleObject".into(), "nsBackendInstance".into()],
            ),
            ("cn", vec![name.to_string()]),
        ];
        attrs.extend(stored_attributes(scope.desired, BACKEND_DN));
        let backend = Entry::with_attrs(&raw_dn(BACKEND_DN, scope.vars), attrs)?;

        let mapping = Entry::with_attrs(
            &raw_dn(MAPPING_TREE_DN, scope.vars),
            [
                ("objectclass", vec!["top", "extensibleObject", "nsMappingTree"]),
                ("cn", vec![suffix.as_str()]),
                ("nsslapd-state", vec!["backend"]),
                ("nsslapd-backend", vec![name]),
            ],
        )?;

        write_all(scope, &[Operation::AddEntry(backend), Operation::AddEntry(mapping)])
    }
}

/// Index existence.
pub struct IndexState;

pub static INDEX_STATE: IndexState = IndexState;

impl ActionBehavior for IndexState {
    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        let name = &scope.desired.name;
        let backend = scope.vars.backend();
        Some(if removing(action) {
            format!("Deleting index {name} on backend {backend}")
        } else {
            format!("Creating index {name} on backend {backend}")
        })
    }

    fn fact(&self, _option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        let dn = scope.vars.dn(INDEX_DN);
        Some(present(scope.snapshot.is_some_and(|s| s.contains(&dn))))
    }

    fn apply(&self, action: &DsAction, scope: &mut ApplyScope<'_>) -> Result<()> {
        let dn = scope.vars.dn(INDEX_DN);
        if removing(action) {
            return write_all(scope, &delete_subtree(scope.snapshot, &dn));
        }
        let mut attrs: Vec<(&str, Vec<String>)> = vec![
            ("objectclass", vec!["top".into(), "nsIndex".into()]),
            ("cn", vec![scope.desired.name.clone()]),
        ];
        attrs.extend(stored_attributes(scope.desired, INDEX_DN));
        if !attrs.iter().any(|(attr, _)| *attr == "nssystemindex") {
            attrs.push(("nssystemindex", vec!["false".into()]));
        }
        let entry = Entry::with_attrs(&raw_dn(INDEX_DN, scope.vars), attrs)?;
        write_all(scope, &[Operation::AddEntry(entry)])
    }
}

/// Replication agreement existence.
pub struct AgreementState;

pub static AGREEMENT_STATE: AgreementState = AgreementState;

impl ActionBehavior for AgreementState {
    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        let name = &scope.desired.name;
        let backend = scope.vars.backend();
        Some(if removing(action) {
            format!("Deleting agreement {name} on {backend}")
        } else {
            format!("Creating agreement {name} on {backend}")
        })
    }

    fn fact(&self, _option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        let dn = scope.vars.dn(AGREEMENT_DN);
        Some(present(scope.snapshot.is_some_and(|s| s.contains(&dn))))
    }

    fn apply(&self, action: &DsAction, scope: &mut ApplyScope<'_>) -> Result<()> {
        let dn = scope.vars.dn(AGREEMENT_DN);
        if removing(action) {
            return write_all(scope, &delete_subtree(scope.snapshot, &dn));
        }
        let mut attrs: Vec<(&str, Vec<String>)> = vec![
            ("objectclass", vec!["top".into(), "nsds5replicationagreement".into()]),
            ("cn", vec![scope.desired.name.clone()]),
            ("nsds5replicaroot", vec![scope.vars.suffix().to_string()]),
        ];
        attrs.extend(stored_attributes(scope.desired, AGREEMENT_DN));
        let entry = Entry::with_attrs(&raw_dn(AGREEMENT_DN, scope.vars), attrs)?;
        write_all(scope, &[Operation::AddEntry(entry)])
    }
}

// ============================================================================
// Replication
// ============================================================================

/// Replica role of a backend. The transition itself is a separate step run
/// after the backend options.
pub struct ReplicaRole;

pub static REPLICA_ROLE: ReplicaRole = ReplicaRole;

impl ActionBehavior for ReplicaRole {
    fn staged(&self) -> bool {
        true
    }

    fn normalize(&self, value: Value) -> Value {
        match value.first().and_then(Role::from_option) {
            Some(role) => Value::text(role.option_value()),
            None => value,
        }
    }

    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        let name = &scope.desired.name;
        let suffix = scope.vars.suffix();
        let role = action.to.as_ref().and_then(Value::first).and_then(Role::from_option)?;
        Some(match role {
            Role::Standalone => format!("Unconfigure replication for backend {name} on suffix {suffix}"),
            role => format!("Configure replication as {role} for backend {name} on suffix {suffix}"),
        })
    }

    fn fact(&self, _option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        Some(Value::text(Role::observe(scope.snapshot, scope.vars).option_value()))
    }
}

/// A property of the replica entry, written by the replica step.
pub struct ReplicaProperty {
    pub dn_valued: bool,
}

pub static REPLICA_PROPERTY: ReplicaProperty = ReplicaProperty { dn_valued: false };
pub static REPLICA_DN_PROPERTY: ReplicaProperty = ReplicaProperty { dn_valued: true };

/// Replica id of replicas that do not accept updates
pub const READ_ONLY_REPLICA_ID: &str = "65535";

impl ActionBehavior for ReplicaProperty {
    fn staged(&self) -> bool {
        true
    }

    fn normalize(&self, value: Value) -> Value {
        DseAttr {
            dn_valued: self.dn_valued,
        }
        .normalize_value(value)
    }

    fn describe(&self, action: &DsAction, scope: &Scope<'_>) -> Option<String> {
        DseAttr::describe_set(action, scope)
    }

    fn fact(&self, option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        let value = stored_value(option, scope.vars, scope.snapshot)?;
        if option.name == "replicaid" && value.first() == Some(READ_ONLY_REPLICA_ID) {
            return None;
        }
        Some(self.normalize(value))
    }
}

/// Password of the replication manager account. Handled by the replica
/// step, never compared.
pub struct ReplicationCredentials;

pub static REPLICATION_CREDENTIALS: ReplicationCredentials = ReplicationCredentials;

impl ActionBehavior for ReplicationCredentials {
    fn actionable(&self) -> bool {
        false
    }
}

// ============================================================================
// Root
// ============================================================================

/// Installation prefix of the host.
pub struct RootPrefix;

pub static ROOT_PREFIX: RootPrefix = RootPrefix;

impl ActionBehavior for RootPrefix {
    fn actionable(&self) -> bool {
        false
    }

    fn fact(&self, _option: &DsOption, scope: &Scope<'_>) -> Option<Value> {
        let prefix = scope.host.prefix().to_string_lossy().to_string();
        (!prefix.is_empty()).then(|| Value::text(prefix))
    }
}

/// The root always exists; `absent` removes every instance.
pub struct RootState;

pub static ROOT_STATE: RootState = RootState;

impl ActionBehavior for RootState {
    fn actionable(&self) -> bool {
        false
    }

    fn fact(&self, _option: &DsOption, _scope: &Scope<'_>) -> Option<Value> {
        Some(Value::text("present"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FileHost;
    use crate::schema::{BACKEND_OPTIONS, INSTANCE_OPTIONS};

    fn option(table: &'static [DsOption], name: &str) -> &'static DsOption {
        table.iter().find(|o| o.name == name).unwrap()
    }

    fn action(option: &'static DsOption, from: Option<&str>, to: &str) -> DsAction {
        DsAction {
            option,
            from: from.map(Value::text),
            to: Some(Value::text(to)),
        }
    }

    #[test]
    fn test_tidy_dn_keeps_case() {
        assert_eq!(tidy_dn("dc=Example, dc=com"), "dc=Example,dc=com");
        assert_eq!(tidy_dn("cn = Directory Manager"), "cn=Directory Manager");
        assert_eq!(tidy_dn("not a dn"), "not a dn");
    }

    #[test]
    fn test_dse_attr_fact_and_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = FileHost::open(dir.path()).unwrap();
        host.create_instance(&InstanceTemplate::new("i1", &dir.path().to_string_lossy()))
            .unwrap();
        let snapshot = host.snapshot("i1").unwrap();
        let vars = Vars::new(&dir.path().to_string_lossy()).child(EntityKind::Instance, "i1");
        let desired = Entity::new(EntityKind::Instance, "i1");
        let scope = Scope {
            host: &host,
            vars: &vars,
            snapshot: snapshot.as_ref(),
            defaults: None,
            desired: &desired,
        };

        let port = option(INSTANCE_OPTIONS, "port");
        assert_eq!(DSE_ATTR.fact(port, &scope), Some(Value::text("389")));

        let act = action(port, Some("389"), "3389");
        assert_eq!(
            DSE_ATTR.describe(&act, &scope).unwrap(),
            "Set nsslapd-port:3389 in cn=config"
        );
        let mut ops = Vec::new();
        DSE_ATTR.stage(&act, &scope, &mut ops).unwrap();
        assert_eq!(ops[0].to_string(), "Replace nsslapd-port: 3389 in cn=config");
    }

    #[test]
    fn test_state_descriptions() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileHost::open(dir.path()).unwrap();
        let vars = Vars::new("")
            .child(EntityKind::Instance, "i1")
            .child(EntityKind::Backend, "userroot")
            .with_suffix(Some("dc=example,dc=com".into()));
        let desired = Entity::new(EntityKind::Backend, "userroot");
        let scope = Scope {
            host: &host,
            vars: &vars,
            snapshot: None,
            defaults: None,
            desired: &desired,
        };
        let state = option(BACKEND_OPTIONS, "state");
        assert_eq!(
            BACKEND_STATE.describe(&action(state, Some("absent"), "present"), &scope).unwrap(),
            "Creating backend userroot on suffix dc=example,dc=com"
        );
        assert_eq!(
            INSTANCE_STATE.describe(&action(state, Some("present"), "absent"), &scope).unwrap(),
            "Removing instance i1"
        );
        let role = option(BACKEND_OPTIONS, "replicarole");
        assert_eq!(
            REPLICA_ROLE.describe(&action(role, None, "supplier"), &scope).unwrap(),
            "Configure replication as supplier for backend userroot on suffix dc=example,dc=com"
        );
    }

    #[test]
    fn test_root_password_checked_by_bind() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = FileHost::open(dir.path()).unwrap();
        let mut template = InstanceTemplate::new("i1", "");
        template.set("root_password", &Value::text("secret12"));
        host.create_instance(&template).unwrap();
        let snapshot = host.snapshot("i1").unwrap();
        let vars = Vars::new("").child(EntityKind::Instance, "i1");
        let desired = Entity::new(EntityKind::Instance, "i1");
        let scope = Scope {
            host: &host,
            vars: &vars,
            snapshot: snapshot.as_ref(),
            defaults: None,
            desired: &desired,
        };
        let rootpw = option(INSTANCE_OPTIONS, "rootpw");
        assert!(ROOT_PASSWORD.ignore(&action(rootpw, None, "secret12"), &scope).unwrap());
        assert!(!ROOT_PASSWORD.ignore(&action(rootpw, None, "other"), &scope).unwrap());
        assert!(!ROOT_PASSWORD.ignore(&action(rootpw, None, "{SSHA}x"), &scope).unwrap());
        assert_eq!(
            ROOT_PASSWORD.describe(&action(rootpw, None, "other"), &scope).unwrap(),
            "Set nsslapd-rootpw in cn=config"
        );
    }
}
