//! Entity kinds and their option tables.
//!
//! Every configurable object has a fixed, compile-time table of
//! [`DsOption`]s. A table entry says where the value lives in dse.ldif, how
//! it is checked, and which [`ActionBehavior`](crate::behavior::ActionBehavior)
//! carries out its actions. DN templates use `{prefix}`, `{instance}`,
//! `{backend}`, `{suffix}`, `{index}` and `{agreement}` placeholders, resolved
//! by [`Vars`].

use crate::behavior::{
    AGREEMENT_STATE, BACKEND_STATE, DSE_ATTR, DSE_DN_ATTR, DsOption, INDEX_STATE, INSTANCE_STATE,
    REPLICA_DN_PROPERTY, REPLICA_PROPERTY, REPLICA_ROLE, REPLICATION_CREDENTIALS, ROOT_PASSWORD,
    ROOT_PREFIX, ROOT_STATE, STARTED, TEMPLATE_ONLY,
};
use declarative::{EntityState, ValueKind};
use dse::{Dn, escape_value};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CONFIG_DN: &str = "cn=config";
pub const LDBM_DATABASE_DN: &str = "cn=ldbm database,cn=plugins,cn=config";
pub const LDBM_CONFIG_DN: &str = "cn=config,cn=ldbm database,cn=plugins,cn=config";
pub const BDB_CONFIG_DN: &str = "cn=bdb,cn=config,cn=ldbm database,cn=plugins,cn=config";
pub const DEFAULT_INDEXES_DN: &str =
    "cn=default indexes,cn=config,cn=ldbm database,cn=plugins,cn=config";
pub const BACKEND_DN: &str = "cn={backend},cn=ldbm database,cn=plugins,cn=config";
pub const MAPPING_TREE_DN: &str = "cn={suffix},cn=mapping tree,cn=config";
pub const REPLICA_DN: &str = "cn=replica,cn={suffix},cn=mapping tree,cn=config";
pub const CHANGELOG_DN: &str = "cn=changelog,cn={backend},cn=ldbm database,cn=plugins,cn=config";
pub const INDEX_DN: &str = "cn={index},cn=index,cn={backend},cn=ldbm database,cn=plugins,cn=config";
pub const AGREEMENT_DN: &str = "cn={agreement},cn=replica,cn={suffix},cn=mapping tree,cn=config";

const STATE_DESC: &str = "Whether the entity is added (present), only modified (updated) or removed (absent)";
const INSTANCE_STATE_DESC: &str = "Like state; 'overwrite' also removes attributes dse_mods does not mention";
const INSTANCE_STATES: &[&str] = &["present", "updated", "absent", "overwrite"];
const BIND_METHODS: &[&str] = &["SIMPLE", "SSLCLIENTAUTH", "SASL/GSSAPI", "SASL/DIGEST-MD5"];
const TRANSPORTS: &[&str] = &["LDAP", "TLS", "SSL"];
const ON_OFF: &[&str] = &["on", "off"];

// ============================================================================
// Entity Kinds
// ============================================================================

/// Kind of a node in the entity tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Root,
    Instance,
    Backend,
    Index,
    Agreement,
}

/// A child collection of an entity kind
#[derive(Debug, Clone, Copy)]
pub struct ChildSpec {
    /// Key in the nested record format
    pub key: &'static str,
    /// Other accepted keys
    pub aliases: &'static [&'static str],
    pub kind: EntityKind,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Instance => "instance",
            Self::Backend => "backend",
            Self::Index => "index",
            Self::Agreement => "agreement",
        }
    }

    pub fn options(&self) -> &'static [DsOption] {
        match self {
            Self::Root => ROOT_OPTIONS,
            Self::Instance => INSTANCE_OPTIONS,
            Self::Backend => BACKEND_OPTIONS,
            Self::Index => INDEX_OPTIONS,
            Self::Agreement => AGREEMENT_OPTIONS,
        }
    }

    pub fn children(&self) -> &'static [ChildSpec] {
        match self {
            Self::Root => &[ChildSpec {
                key: "instances",
                aliases: &["ds389_server_instances"],
                kind: Self::Instance,
            }],
            Self::Instance => &[ChildSpec {
                key: "backends",
                aliases: &[],
                kind: Self::Backend,
            }],
            Self::Backend => &[
                ChildSpec {
                    key: "indexes",
                    aliases: &[],
                    kind: Self::Index,
                },
                ChildSpec {
                    key: "agmts",
                    aliases: &["agreements"],
                    kind: Self::Agreement,
                },
            ],
            Self::Index | Self::Agreement => &[],
        }
    }

    /// Look up an option by name or alias.
    pub fn option(&self, name: &str) -> Option<&'static DsOption> {
        let name = match (self, name) {
            (Self::Root, "ds389_prefix") => "prefix",
            (_, other) => other,
        };
        self.options().iter().find(|o| o.name == name)
    }

    /// Look up a child collection by key or alias.
    pub fn child(&self, key: &str) -> Option<&'static ChildSpec> {
        self.children()
            .iter()
            .find(|c| c.key == key || c.aliases.contains(&key))
    }

    /// The child collection holding entities of `kind`.
    pub fn child_of_kind(&self, kind: EntityKind) -> Option<&'static ChildSpec> {
        self.children().iter().find(|c| c.kind == kind)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Check the option tables once: unique names, defaults and choices that
/// pass their own checks, storage on every stored option.
pub fn check_tables() -> Result<(), String> {
    for kind in [
        EntityKind::Root,
        EntityKind::Instance,
        EntityKind::Backend,
        EntityKind::Index,
        EntityKind::Agreement,
    ] {
        let options = kind.options();
        for (i, option) in options.iter().enumerate() {
            if options[..i].iter().any(|o| o.name == option.name) {
                return Err(format!("{kind}: duplicate option {}", option.name));
            }
            if let Some(default) = option.default {
                option
                    .check(kind.label(), default.into())
                    .map_err(|e| format!("{kind}: default of {}: {e}", option.name))?;
            }
            if kind.child(option.name).is_some() {
                return Err(format!("{kind}: option {} shadows a child key", option.name));
            }
        }
        if kind != EntityKind::Root && kind.option("state").is_none() {
            return Err(format!("{kind}: no state option"));
        }
    }
    Ok(())
}

// ============================================================================
// DN Variables
// ============================================================================

/// Values substituted into DN templates for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars {
    pub prefix: String,
    pub instance: Option<String>,
    pub backend: Option<String>,
    pub suffix: Option<String>,
    pub index: Option<String>,
    pub agreement: Option<String>,
}

impl Vars {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Variables of a child entity named `name`.
    pub fn child(&self, kind: EntityKind, name: &str) -> Self {
        let mut vars = self.clone();
        let name = Some(name.to_string());
        match kind {
            EntityKind::Root => {}
            EntityKind::Instance => vars.instance = name,
            EntityKind::Backend => vars.backend = name,
            EntityKind::Index => vars.index = name,
            EntityKind::Agreement => vars.agreement = name,
        }
        vars
    }

    pub fn with_suffix(mut self, suffix: Option<String>) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn instance(&self) -> &str {
        self.instance.as_deref().unwrap_or_default()
    }

    pub fn backend(&self) -> &str {
        self.backend.as_deref().unwrap_or_default()
    }

    pub fn suffix(&self) -> &str {
        self.suffix.as_deref().unwrap_or_default()
    }

    /// Fill a template. RDN values are escaped, `{prefix}` is not.
    pub fn resolve(&self, template: &str) -> String {
        let rdn = |v: &Option<String>| escape_value(v.as_deref().unwrap_or_default());
        template
            .replace("{prefix}", &self.prefix)
            .replace("{instance}", self.instance())
            .replace("{backend}", &rdn(&self.backend))
            .replace(
                "{suffix}",
                &escape_value(&self.suffix.as_deref().map(|s| Dn::new(s).to_string()).unwrap_or_default()),
            )
            .replace("{index}", &rdn(&self.index))
            .replace("{agreement}", &rdn(&self.agreement))
    }

    pub fn dn(&self, template: &str) -> Dn {
        Dn::new(&self.resolve(template))
    }
}

// ============================================================================
// Option Tables
// ============================================================================

pub static ROOT_OPTIONS: &[DsOption] = &[
    DsOption::new("prefix", "Non standard installation path", &ROOT_PREFIX).prio(1),
    DsOption::new("state", "If 'absent' then every instance is removed", &ROOT_STATE)
        .prio(2)
        .default("present")
        .choices(EntityState::CHOICES),
];

pub static INSTANCE_OPTIONS: &[DsOption] = &[
    DsOption::new("state", INSTANCE_STATE_DESC, &INSTANCE_STATE)
        .prio(2)
        .default("present")
        .choices(INSTANCE_STATES),
    DsOption::new("backup_dir", "Directory containing the backup files", &DSE_ATTR)
        .stored("nsslapd-bakdir", CONFIG_DN)
        .template("backup_dir"),
    DsOption::new("bin_dir", "Directory containing the ns-slapd binary", &DSE_ATTR)
        .stored("nsslapd-bin_dir", CONFIG_DN)
        .template("bin_dir"),
    DsOption::new("cert_dir", "Directory containing the NSS certificate databases", &DSE_ATTR)
        .stored("nsslapd-certdir", CONFIG_DN)
        .template("cert_dir"),
    DsOption::new("config_dir", "Configuration directory of the instance", &TEMPLATE_ONLY)
        .template("config_dir"),
    DsOption::new("data_dir", "Location of shared static data", &TEMPLATE_ONLY)
        .template("data_dir"),
    DsOption::new("db_dir", "Database directory of the instance", &DSE_ATTR)
        .stored("nsslapd-directory", LDBM_CONFIG_DN)
        .template("db_dir"),
    DsOption::new("db_home_dir", "Memory-mapped database files location", &DSE_ATTR)
        .stored("nsslapd-db-home-directory", BDB_CONFIG_DN)
        .template("db_home_dir"),
    DsOption::new("db_lib", "Database implementation library", &DSE_ATTR)
        .stored("nsslapd-backend-implement", LDBM_CONFIG_DN)
        .template("db_lib")
        .choices(&["bdb", "mdb"]),
    DsOption::new("full_machine_name", "Fully qualified hostname of this system", &DSE_ATTR)
        .stored("nsslapd-localhost", CONFIG_DN)
        .template("full_machine_name"),
    DsOption::new("group", "Group the server runs as", &DSE_ATTR)
        .stored("nsslapd-group", CONFIG_DN)
        .template("group"),
    DsOption::new("initconfig_dir", "Operating system rc configuration directory", &TEMPLATE_ONLY)
        .template("initconfig_dir"),
    DsOption::new("instance_name", "Name of the instance", &TEMPLATE_ONLY)
        .template("instance_name"),
    DsOption::new("inst_dir", "Directory containing instance-specific scripts", &TEMPLATE_ONLY)
        .template("inst_dir"),
    DsOption::new("ldapi", "Location of the LDAPI socket", &DSE_ATTR)
        .stored("nsslapd-ldapifilepath", CONFIG_DN)
        .template("ldapi"),
    DsOption::new("ldif_dir", "Directory containing import and export files", &DSE_ATTR)
        .stored("nsslapd-ldifdir", CONFIG_DN)
        .template("ldif_dir"),
    DsOption::new("lib_dir", "Location of shared libraries", &TEMPLATE_ONLY)
        .template("lib_dir"),
    DsOption::new("local_state_dir", "Location of variable data", &TEMPLATE_ONLY)
        .template("local_state_dir"),
    DsOption::new("lock_dir", "Directory containing the lock files", &DSE_ATTR)
        .stored("nsslapd-lockdir", CONFIG_DN)
        .template("lock_dir"),
    DsOption::new("port", "TCP port for LDAP connections", &DSE_ATTR)
        .stored("nsslapd-port", CONFIG_DN)
        .template("port")
        .kind(ValueKind::Int),
    DsOption::new("root_dn", "DN of the administrator account", &DSE_DN_ATTR)
        .stored("nsslapd-rootdn", CONFIG_DN)
        .template("root_dn"),
    DsOption::new("rootpw", "Password of the administrator account", &ROOT_PASSWORD)
        .stored("nsslapd-rootpw", CONFIG_DN)
        .template("root_password")
        .hidden(),
    DsOption::new("run_dir", "Directory containing the pid file", &DSE_ATTR)
        .stored("nsslapd-rundir", CONFIG_DN)
        .template("run_dir"),
    DsOption::new("sbin_dir", "Location of the administration binaries", &TEMPLATE_ONLY)
        .template("sbin_dir"),
    DsOption::new("schema_dir", "Directory containing the schema files", &DSE_ATTR)
        .stored("nsslapd-schemadir", CONFIG_DN)
        .template("schema_dir"),
    DsOption::new("secure_port", "TCP port for LDAPS connections", &DSE_ATTR)
        .stored("nsslapd-secureport", CONFIG_DN)
        .template("secure_port")
        .kind(ValueKind::Int),
    DsOption::new("self_sign_cert", "Create a self-signed certificate at setup", &TEMPLATE_ONLY)
        .template("self_sign_cert")
        .kind(ValueKind::Bool),
    DsOption::new("self_sign_cert_valid_months", "Validity of the self-signed certificate", &TEMPLATE_ONLY)
        .template("self_sign_cert_valid_months")
        .kind(ValueKind::Int),
    DsOption::new("selinux", "Enable SELinux integration at setup", &TEMPLATE_ONLY)
        .template("selinux")
        .kind(ValueKind::Bool),
    DsOption::new("started", "Whether the instance is (or should be) started", &STARTED)
        .prio(99)
        .default("true")
        .kind(ValueKind::Bool),
    DsOption::new("strict_host_checking", "Verify the forward and reverse host records", &TEMPLATE_ONLY)
        .template("strict_host_checking")
        .kind(ValueKind::Bool),
    DsOption::new("sysconf_dir", "System configuration directory", &TEMPLATE_ONLY)
        .template("sysconf_dir"),
    DsOption::new("systemd", "Enable systemd platform features", &TEMPLATE_ONLY)
        .template("systemd")
        .kind(ValueKind::Bool),
    DsOption::new("tmp_dir", "Temporary directory of the instance", &DSE_ATTR)
        .stored("nsslapd-tmpdir", CONFIG_DN)
        .template("tmp_dir"),
    DsOption::new("user", "User the server runs as", &DSE_ATTR)
        .stored("nsslapd-localuser", CONFIG_DN)
        .template("user"),
    DsOption::new("nsslapd_lookthroughlimit", "Entries examined by a search before giving up", &DSE_ATTR)
        .stored("nsslapd-lookthroughlimit", LDBM_CONFIG_DN)
        .default("5000")
        .kind(ValueKind::Int),
    DsOption::new("nsslapd_mode", "Database file permissions (octal)", &DSE_ATTR)
        .stored("nsslapd-mode", LDBM_CONFIG_DN)
        .default("600")
        .kind(ValueKind::Int),
    DsOption::new("nsslapd_idlistscanlimit", "Index keys above this size are treated as unindexed", &DSE_ATTR)
        .stored("nsslapd-idlistscanlimit", LDBM_CONFIG_DN)
        .default("4000")
        .kind(ValueKind::Int),
    DsOption::new("nsslapd_import_cachesize", "Database cache size during import", &DSE_ATTR)
        .stored("nsslapd-import-cachesize", LDBM_CONFIG_DN)
        .default("16777216")
        .kind(ValueKind::Int),
    DsOption::new("nsslapd_search_bypass_filter_test", "Skip filter checks when building candidate lists", &DSE_ATTR)
        .stored("nsslapd-search-bypass-filter-test", LDBM_CONFIG_DN)
        .default("on")
        .choices(&["on", "off", "verify"]),
    DsOption::new("nsslapd_search_use_vlv_index", "Enable virtual list view searches", &DSE_ATTR)
        .stored("nsslapd-search-use-vlv-index", LDBM_CONFIG_DN)
        .default("on")
        .choices(ON_OFF),
    DsOption::new("nsslapd_exclude_from_export", "Attributes left out of exports", &DSE_ATTR)
        .stored("nsslapd-exclude-from-export", LDBM_CONFIG_DN)
        .default("entrydn entryid dncomp parentid numSubordinates tombstonenumsubordinates entryusn"),
    DsOption::new("nsslapd_pagedlookthroughlimit", "Look-through limit of paged searches", &DSE_ATTR)
        .stored("nsslapd-pagedlookthroughlimit", LDBM_CONFIG_DN)
        .default("0")
        .kind(ValueKind::Int),
    DsOption::new("nsslapd_pagedidlistscanlimit", "ID list scan limit of paged searches", &DSE_ATTR)
        .stored("nsslapd-pagedidlistscanlimit", LDBM_CONFIG_DN)
        .default("0")
        .kind(ValueKind::Int),
    DsOption::new("nsslapd_rangelookthroughlimit", "Look-through limit of range searches", &DSE_ATTR)
        .stored("nsslapd-rangelookthroughlimit", LDBM_CONFIG_DN)
        .default("5000")
        .kind(ValueKind::Int),
    DsOption::new("nsslapd_backend_opt_level", "Experimental write performance level", &DSE_ATTR)
        .stored("nsslapd-backend-opt-level", LDBM_CONFIG_DN)
        .default("1")
        .kind(ValueKind::Int),
];

pub static BACKEND_OPTIONS: &[DsOption] = &[
    DsOption::new("state", STATE_DESC, &BACKEND_STATE)
        .prio(2)
        .default("present")
        .choices(EntityState::CHOICES),
    DsOption::new("suffix", "DN subtree root of the entries managed by this backend", &DSE_DN_ATTR)
        .stored("nsslapd-suffix", BACKEND_DN)
        .prio(5)
        .required()
        .readonly(),
    DsOption::new("readonly", "Refuse write operations", &DSE_ATTR)
        .stored("nsslapd-readonly", BACKEND_DN)
        .default("off")
        .kind(ValueKind::Switch),
    DsOption::new("require_index", "Refuse unindexed searches", &DSE_ATTR)
        .stored("nsslapd-require-index", BACKEND_DN)
        .kind(ValueKind::Switch),
    DsOption::new("entry_cache_number", "Maximum number of cached entries", &DSE_ATTR)
        .stored("nsslapd-cachesize", BACKEND_DN)
        .kind(ValueKind::Int),
    DsOption::new("entry_cache_size", "Entry cache size in bytes", &DSE_ATTR)
        .stored("nsslapd-cachememsize", BACKEND_DN)
        .kind(ValueKind::Int),
    DsOption::new("dn_cache_size", "DN cache size in bytes", &DSE_ATTR)
        .stored("nsslapd-dncachememsize", BACKEND_DN)
        .kind(ValueKind::Int),
    DsOption::new("directory", "Database directory of this backend", &DSE_ATTR)
        .stored("nsslapd-directory", BACKEND_DN),
    DsOption::new("sample_entries", "Create sample entries with the backend", &TEMPLATE_ONLY)
        .kind(ValueKind::Bool),
    DsOption::new("replicarole", "Replica role", &REPLICA_ROLE)
        .prio(9)
        .default("none")
        .choices(&["none", "standalone", "supplier", "hub", "consumer"]),
    DsOption::new("replicaid", "Unique supplier id in the topology (1 to 65534)", &REPLICA_PROPERTY)
        .stored("nsds5replicaid", REPLICA_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicabinddn", "DN allowed to replay updates on this replica", &REPLICA_DN_PROPERTY)
        .stored("nsds5replicabinddn", REPLICA_DN),
    DsOption::new("replicacredentials", "Password of the replication manager", &REPLICATION_CREDENTIALS)
        .hidden(),
    DsOption::new("replicabinddngroup", "Group of the DNs allowed to replay updates", &REPLICA_DN_PROPERTY)
        .stored("nsds5replicabinddngroup", REPLICA_DN),
    DsOption::new("replicabinddngroupcheckinterval", "Interval between bind group checks", &REPLICA_PROPERTY)
        .stored("nsds5replicabinddngroupcheckinterval", REPLICA_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicabackoffmax", "Maximum retry delay after a recoverable failure", &REPLICA_PROPERTY)
        .stored("nsds5replicabackoffmax", REPLICA_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicabackoffmin", "Minimum retry delay after a recoverable failure", &REPLICA_PROPERTY)
        .stored("nsds5replicabackoffmin", REPLICA_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicaprecisetombstonepurging", "Purge tombstones precisely", &REPLICA_PROPERTY)
        .stored("nsds5replicaprecisetombstonepurging", REPLICA_DN),
    DsOption::new("replicaprotocoltimeout", "Timeout when stopping replication", &REPLICA_PROPERTY)
        .stored("nsds5replicaprotocoltimeout", REPLICA_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicapurgedelay", "Maximum age of tombstones and state information", &REPLICA_PROPERTY)
        .stored("nsds5replicapurgedelay", REPLICA_DN),
    DsOption::new("replicareferral", "Referrals returned to writes on a read-only replica", &REPLICA_PROPERTY)
        .stored("nsds5replicareferral", REPLICA_DN)
        .kind(ValueKind::List),
    DsOption::new("replicareleasetimeout", "Seconds before a supplier releases a replica", &REPLICA_PROPERTY)
        .stored("nsds5replicareleasetimeout", REPLICA_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicatombstonepurgeinterval", "Seconds between tombstone purges", &REPLICA_PROPERTY)
        .stored("nsds5replicatombstonepurgeinterval", REPLICA_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicawaitforasyncresults", "Milliseconds before resending an unacknowledged update", &REPLICA_PROPERTY)
        .stored("nsds5replicawaitforasyncresults", REPLICA_DN)
        .kind(ValueKind::Int),
    DsOption::new("changelogencryptionalgorithm", "Changelog encryption algorithm", &DSE_ATTR)
        .stored("nsslapd-encryptionalgorithm", CHANGELOG_DN),
    DsOption::new("changelogmaxage", "Changelog record lifetime", &DSE_ATTR)
        .stored("nsslapd-changelogmaxage", CHANGELOG_DN),
    DsOption::new("changelogmaxentries", "Maximum number of changelog records", &DSE_ATTR)
        .stored("nsslapd-changelogmaxentries", CHANGELOG_DN)
        .kind(ValueKind::Int),
    DsOption::new("changelogsymetrickey", "Changelog encryption key", &DSE_ATTR)
        .stored("nssymmetrickey", CHANGELOG_DN)
        .hidden(),
    DsOption::new("changelogtriminterval", "Seconds between changelog trimming runs", &DSE_ATTR)
        .stored("nsslapd-changelogtrim-interval", CHANGELOG_DN)
        .kind(ValueKind::Int),
];

pub static INDEX_OPTIONS: &[DsOption] = &[
    DsOption::new("state", STATE_DESC, &INDEX_STATE)
        .prio(2)
        .default("present")
        .choices(EntityState::CHOICES),
    DsOption::new("indextype", "Index types (pres, eq, sub, approx, matching rule OID)", &DSE_ATTR)
        .stored("nsindextype", INDEX_DN)
        .required()
        .kind(ValueKind::List),
    DsOption::new("matchingrule", "Matching rules of the index", &DSE_ATTR)
        .stored("nsmatchingrule", INDEX_DN)
        .kind(ValueKind::List),
    DsOption::new("systemindex", "Whether the index is a system index", &DSE_ATTR)
        .stored("nssystemindex", INDEX_DN)
        .default("false")
        .kind(ValueKind::Bool),
];

pub static AGREEMENT_OPTIONS: &[DsOption] = &[
    DsOption::new("state", STATE_DESC, &AGREEMENT_STATE)
        .prio(2)
        .default("present")
        .choices(EntityState::CHOICES),
    DsOption::new("replicahost", "Target instance hostname", &DSE_ATTR)
        .stored("nsds5replicahost", AGREEMENT_DN),
    DsOption::new("replicaport", "Target instance port", &DSE_ATTR)
        .stored("nsds5replicaport", AGREEMENT_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicabinddn", "DN used to connect to the target instance", &DSE_DN_ATTR)
        .stored("nsds5replicabinddn", AGREEMENT_DN),
    DsOption::new("replicacredentials", "Credentials associated with the bind", &DSE_ATTR)
        .stored("nsds5replicacredentials", AGREEMENT_DN)
        .hidden(),
    DsOption::new("replicabindmethod", "Bind method", &DSE_ATTR)
        .stored("nsds5replicabindmethod", AGREEMENT_DN)
        .choices(BIND_METHODS),
    DsOption::new("replicatransportinfo", "Encryption of the connection", &DSE_ATTR)
        .stored("nsds5replicatransportinfo", AGREEMENT_DN)
        .choices(TRANSPORTS),
    DsOption::new("replicabootstrapbinddn", "Fallback bind DN after an authentication error", &DSE_DN_ATTR)
        .stored("nsds5replicabootstrapbinddn", AGREEMENT_DN),
    DsOption::new("replicabootstrapbindmethod", "Fallback bind method", &DSE_ATTR)
        .stored("nsds5replicabootstrapbindmethod", AGREEMENT_DN)
        .choices(BIND_METHODS),
    DsOption::new("replicabootstrapcredentials", "Credentials of the fallback bind", &DSE_ATTR)
        .stored("nsds5replicabootstrapcredentials", AGREEMENT_DN)
        .hidden(),
    DsOption::new("replicabootstraptransportinfo", "Encryption of the fallback connection", &DSE_ATTR)
        .stored("nsds5replicabootstraptransportinfo", AGREEMENT_DN)
        .choices(TRANSPORTS),
    DsOption::new("replicabusywaittime", "Seconds to wait after a busy consumer", &DSE_ATTR)
        .stored("nsds5replicabusywaittime", AGREEMENT_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicaenabled", "Whether the agreement is enabled", &DSE_ATTR)
        .stored("nsds5replicaenabled", AGREEMENT_DN)
        .choices(ON_OFF),
    DsOption::new("replicaflowcontrolpause", "Milliseconds to pause when the flow control window is full", &DSE_ATTR)
        .stored("nsds5replicaflowcontrolpause", AGREEMENT_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicaflowcontrolwindow", "Unacknowledged updates before pausing", &DSE_ATTR)
        .stored("nsds5replicaflowcontrolwindow", AGREEMENT_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicaignoremissingchange", "Behavior when a change is missing", &DSE_ATTR)
        .stored("nsds5replicaignoremissingchange", AGREEMENT_DN)
        .choices(&["never", "once", "always", "on", "off"]),
    DsOption::new("replicasessionpausetime", "Seconds between update sessions", &DSE_ATTR)
        .stored("nsds5replicasessionpausetime", AGREEMENT_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicastripattrs", "Attributes stripped from fractional updates", &DSE_ATTR)
        .stored("nsds5replicastripattrs", AGREEMENT_DN)
        .kind(ValueKind::List),
    DsOption::new("replicatedattributelist", "Attributes excluded from incremental updates", &DSE_ATTR)
        .stored("nsds5replicatedattributelist", AGREEMENT_DN)
        .kind(ValueKind::List),
    DsOption::new("replicatedattributelisttotal", "Attributes excluded from total updates", &DSE_ATTR)
        .stored("nsds5replicatedattributelisttotal", AGREEMENT_DN)
        .kind(ValueKind::List),
    DsOption::new("replicatimeout", "Seconds to wait for the remote replica", &DSE_ATTR)
        .stored("nsds5replicatimeout", AGREEMENT_DN)
        .kind(ValueKind::Int),
    DsOption::new("replicaupdateschedule", "Replication schedule (HHMM-HHMM days)", &DSE_ATTR)
        .stored("nsds5replicaupdateschedule", AGREEMENT_DN)
        .kind(ValueKind::List),
    DsOption::new("replicawaitforasyncresults", "Milliseconds to wait for a consumer that is not ready", &DSE_ATTR)
        .stored("nsds5replicawaitforasyncresults", AGREEMENT_DN)
        .kind(ValueKind::Int),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_consistent() {
        check_tables().unwrap();
    }

    #[test]
    fn test_option_lookup_with_alias() {
        assert_eq!(EntityKind::Root.option("ds389_prefix").unwrap().name, "prefix");
        assert!(EntityKind::Instance.option("port").is_some());
        assert!(EntityKind::Instance.option("nope").is_none());
        assert_eq!(
            EntityKind::Root.child("ds389_server_instances").unwrap().kind,
            EntityKind::Instance
        );
        assert_eq!(EntityKind::Backend.child("agreements").unwrap().key, "agmts");
    }

    #[test]
    fn test_resolve_escapes_rdn_values() {
        let vars = Vars::new("/opt/")
            .child(EntityKind::Instance, "i1")
            .child(EntityKind::Backend, "userRoot")
            .with_suffix(Some("dc=example, dc=com".into()));
        assert_eq!(
            vars.dn(MAPPING_TREE_DN),
            Dn::new("cn=\"dc=example,dc=com\",cn=mapping tree,cn=config")
        );
        assert_eq!(
            vars.dn(REPLICA_DN).parent(),
            Some(vars.dn(MAPPING_TREE_DN))
        );
        assert_eq!(
            vars.dn(BACKEND_DN).as_str(),
            "cn=userroot,cn=ldbm database,cn=plugins,cn=config"
        );
        assert_eq!(vars.resolve("{prefix}/x"), "/opt/x");
    }

    #[test]
    fn test_state_sorted_first() {
        let mut options: Vec<&DsOption> = BACKEND_OPTIONS.iter().collect();
        options.sort_by(|a, b| declarative::by_weight(*a, *b));
        let names: Vec<&str> = options.iter().take(3).map(|o| o.name).collect();
        assert_eq!(names, vec!["state", "suffix", "replicarole"]);
    }
}
