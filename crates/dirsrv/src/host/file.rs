//! Directory host backed by dse.ldif files under an installation prefix.
//!
//! Instances are discovered as `{prefix}/etc/dirsrv/slapd-*/dse.ldif`.
//! Writes land in an in-memory store per instance and reach the disk on
//! [`FileHost::flush`]. Whether an instance runs is kept in a small JSON
//! state file next to the instance directories.

use super::DirectoryHost;
use crate::error::{Error, Result};
use crate::password;
use crate::schema::{DEFAULT_INDEXES_DN, LDBM_DATABASE_DN};
use crate::template::InstanceTemplate;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use dse::ldif::{self, WriteOptions};
use dse::{Dn, Entry, KnownClass, ModKind, Operation, Snapshot, Store};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Attributes the server refuses to change while running.
const OFFLINE_ATTRIBUTES: &[&str] = &["nsslapd-suffix"];

/// Attributes holding passwords, stored hashed.
const PASSWORD_ATTRIBUTES: &[&str] = &["nsslapd-rootpw", "userpassword"];

const STATE_FILE: &str = ".dsconverge-state.json";

// ============================================================================
// State File
// ============================================================================

/// Persisted run state of the instances under one prefix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostState {
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceRecord>,
}

/// Run state of one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub started: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl InstanceRecord {
    fn new(started: bool, created: bool) -> Self {
        let now = Utc::now();
        Self {
            started,
            created_at: created.then_some(now),
            updated_at: now,
        }
    }
}

// ============================================================================
// FileHost
// ============================================================================

/// A host whose instances are plain dse.ldif files
#[derive(Debug)]
pub struct FileHost {
    prefix: PathBuf,
    stores: BTreeMap<String, Store>,
    state: HostState,
    dirty: BTreeSet<String>,
    removed: BTreeSet<String>,
}

impl FileHost {
    /// Discover the instances under `prefix`.
    pub fn open(prefix: &Path) -> Result<Self> {
        let mut host = Self {
            prefix: prefix.to_path_buf(),
            stores: BTreeMap::new(),
            state: HostState::default(),
            dirty: BTreeSet::new(),
            removed: BTreeSet::new(),
        };

        let config_dir = host.config_dir();
        if config_dir.is_dir() {
            let candidates: Vec<(String, PathBuf)> = WalkDir::new(&config_dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_dir())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().strip_prefix("slapd-")?.to_string();
                    Some((name, e.path().join("dse.ldif")))
                })
                .collect();

            // Instances are independent; parse them in parallel
            let snapshots: Vec<(String, PathBuf, Option<Snapshot>)> = candidates
                .into_par_iter()
                .map(|(name, path)| -> Result<(String, PathBuf, Option<Snapshot>)> {
                    let snapshot = ldif::read_optional(&path)?;
                    Ok((name, path, snapshot))
                })
                .collect::<Result<_>>()?;

            for (name, path, snapshot) in snapshots {
                if let Some(snapshot) = snapshot {
                    log::debug!("Found instance {name} at {}", path.display());
                    host.stores.insert(name, Store::from_snapshot(snapshot));
                }
            }
        }

        host.state = host.load_state()?;
        for name in host.stores.keys() {
            // Instances nobody recorded are assumed running
            host.state
                .instances
                .entry(name.clone())
                .or_insert_with(|| InstanceRecord::new(true, false));
        }
        host.state
            .instances
            .retain(|name, _| host.stores.contains_key(name));

        Ok(host)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.prefix.join("etc").join("dirsrv")
    }

    pub fn instance_dir(&self, instance: &str) -> PathBuf {
        self.config_dir().join(format!("slapd-{instance}"))
    }

    pub fn dse_path(&self, instance: &str) -> PathBuf {
        self.instance_dir(instance).join("dse.ldif")
    }

    fn state_path(&self) -> PathBuf {
        self.config_dir().join(STATE_FILE)
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    fn load_state(&self) -> Result<HostState> {
        let path = self.state_path();
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(HostState::default());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| Error::State {
            path: path.clone(),
            message: e.to_string(),
        })
    }

    /// Write changed instances back to disk and save the run state.
    pub fn flush(&mut self) -> Result<()> {
        for name in std::mem::take(&mut self.removed) {
            let dir = self.instance_dir(&name);
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
                log::debug!("Removed {}", dir.display());
            }
        }

        let options = WriteOptions::default();
        for name in std::mem::take(&mut self.dirty) {
            let Some(store) = self.stores.get(&name) else {
                continue;
            };
            let path = self.dse_path(&name);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            ldif::write_file(&store.snapshot(), &path, &options)?;
            log::debug!("Wrote {}", path.display());
        }

        let path = self.state_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(&self.state).map_err(|e| Error::State {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, content)?;
        Ok(())
    }

    fn store_mut(&mut self, instance: &str) -> Result<&mut Store> {
        self.stores
            .get_mut(instance)
            .ok_or_else(|| Error::NoSuchInstance(instance.to_string()))
    }

    fn set_started(&mut self, instance: &str, started: bool) -> Result<()> {
        if !self.stores.contains_key(instance) {
            return Err(Error::NoSuchInstance(instance.to_string()));
        }
        let record = self
            .state
            .instances
            .entry(instance.to_string())
            .or_insert_with(|| InstanceRecord::new(started, false));
        record.started = started;
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Reject changes the server only accepts while stopped.
    fn check_online(&self, instance: &str, op: &Operation) -> Result<()> {
        if !self.is_started(instance) {
            return Ok(());
        }
        if let Operation::Modify { dn, mods } = op {
            if let Some(m) = mods
                .iter()
                .find(|m| OFFLINE_ATTRIBUTES.contains(&m.attr.as_str()))
            {
                return Err(Error::RequiresOffline {
                    instance: instance.to_string(),
                    dn: dn.to_string(),
                    attr: m.attr.clone(),
                });
            }
        }
        Ok(())
    }

    /// Per-backend entries the server creates along with a backend.
    fn backend_children(store: &Store, backend: &Entry) -> Result<Vec<Entry>> {
        let mut children = Vec::new();
        let container = Entry::with_attrs(
            &format!("cn=index,{}", backend.raw_dn),
            [
                ("objectclass", vec!["top", "extensibleObject"]),
                ("cn", vec!["index"]),
            ],
        )?;

        let defaults = Dn::new(DEFAULT_INDEXES_DN);
        let snapshot = store.snapshot();
        for dn in snapshot.descendants(&defaults) {
            let Some(template) = snapshot.get_dn(dn) else {
                continue;
            };
            let Some(cn) = template.first("cn") else {
                continue;
            };
            let mut index = Entry::new(&format!("cn={cn},{}", container.raw_dn));
            for (attr, values) in template.attributes() {
                for value in values {
                    index.add_value(attr, value.clone())?;
                }
            }
            children.push(index);
        }

        children.insert(0, container);
        Ok(children)
    }
}

fn hash_passwords(op: &Operation) -> Operation {
    let hash_all = |values: &[String]| values.iter().map(|v| password::hash(v)).collect::<Vec<_>>();
    match op {
        Operation::AddEntry(entry) => {
            let mut entry = entry.clone();
            for attr in PASSWORD_ATTRIBUTES {
                if let Some(values) = entry.values(attr).map(hash_all) {
                    // Same number of values, no duplicates introduced
                    let _ = entry.replace(attr, values);
                }
            }
            Operation::AddEntry(entry)
        }
        Operation::Modify { dn, mods } => {
            let mut mods = mods.clone();
            for m in &mut mods {
                if m.kind != ModKind::Delete && PASSWORD_ATTRIBUTES.contains(&m.attr.as_str()) {
                    m.values = hash_all(&m.values);
                }
            }
            Operation::Modify {
                dn: dn.clone(),
                mods,
            }
        }
        Operation::DeleteEntry(_) => op.clone(),
    }
}

impl DirectoryHost for FileHost {
    fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn instances(&self) -> Result<Vec<String>> {
        Ok(self.stores.keys().cloned().collect())
    }

    fn snapshot(&self, instance: &str) -> Result<Option<Snapshot>> {
        Ok(self.stores.get(instance).map(Store::snapshot))
    }

    fn create_instance(&mut self, template: &InstanceTemplate) -> Result<()> {
        let name = template.name.clone();
        if self.stores.contains_key(&name) {
            return Err(Error::InstanceExists(name));
        }

        let mut template = template.clone();
        template.prefix = self.prefix.to_string_lossy().trim_end_matches('/').to_string();
        if let Some(pw) = template.get("root_password").map(password::hash) {
            template.set("root_password", &pw.into());
        }
        let snapshot = template.snapshot()?;

        log::info!("Creating instance slapd-{name}");
        self.stores.insert(name.clone(), Store::from_snapshot(snapshot));
        self.state
            .instances
            .insert(name.clone(), InstanceRecord::new(true, true));
        self.removed.remove(&name);
        self.dirty.insert(name);
        Ok(())
    }

    fn delete_instance(&mut self, instance: &str) -> Result<()> {
        if self.stores.remove(instance).is_none() {
            return Err(Error::NoSuchInstance(instance.to_string()));
        }
        log::info!("Removing instance slapd-{instance}");
        self.state.instances.remove(instance);
        self.dirty.remove(instance);
        self.removed.insert(instance.to_string());
        Ok(())
    }

    fn is_started(&self, instance: &str) -> bool {
        self.stores.contains_key(instance)
            && self
                .state
                .instances
                .get(instance)
                .is_some_and(|r| r.started)
    }

    fn start(&mut self, instance: &str) -> Result<()> {
        log::info!("Starting instance slapd-{instance}");
        self.set_started(instance, true)
    }

    fn stop(&mut self, instance: &str) -> Result<()> {
        log::info!("Stopping instance slapd-{instance}");
        self.set_started(instance, false)
    }

    fn write(&mut self, instance: &str, op: &Operation) -> Result<()> {
        self.check_online(instance, op)?;
        let op = hash_passwords(op);
        let store = self.store_mut(instance)?;

        log::debug!("slapd-{instance}: {op}");
        store.apply(&op)?;

        if let Operation::AddEntry(entry) = &op {
            let is_backend = KnownClass::classify(entry) == KnownClass::NsBackendInstance
                && entry.dn.parent() == Some(Dn::new(LDBM_DATABASE_DN));
            if is_backend {
                for child in Self::backend_children(store, entry)? {
                    store.apply(&Operation::AddEntry(child))?;
                }
            }
        }

        self.dirty.insert(instance.to_string());
        Ok(())
    }

    fn check_bind(&self, instance: &str, dn: &str, password: &str) -> Result<bool> {
        let Some(store) = self.stores.get(instance) else {
            return Ok(false);
        };
        let dn = Dn::new(dn);
        let config = store.get(&Dn::new("cn=config"));
        let root_dn = config
            .and_then(|e| e.first("nsslapd-rootdn"))
            .map(Dn::new);

        let stored = if root_dn.as_ref() == Some(&dn) {
            config.and_then(|e| e.first("nsslapd-rootpw"))
        } else {
            store.get(&dn).and_then(|e| e.first("userpassword"))
        };

        Ok(stored.is_some_and(|s| password::verify(password, s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dse::Modification;
    use tempfile::TempDir;

    fn host_with(names: &[&str]) -> (TempDir, FileHost) {
        let tmp = TempDir::new().unwrap();
        let mut host = FileHost::open(tmp.path()).unwrap();
        for name in names {
            host.create_instance(&InstanceTemplate::new(name, &tmp.path().to_string_lossy()))
                .unwrap();
        }
        (tmp, host)
    }

    #[test]
    fn test_create_flush_and_reopen() {
        let (tmp, mut host) = host_with(&["i1"]);
        host.flush().unwrap();
        assert!(host.dse_path("i1").exists());

        let reopened = FileHost::open(tmp.path()).unwrap();
        assert_eq!(reopened.instances().unwrap(), vec!["i1"]);
        assert!(reopened.is_started("i1"));
    }

    #[test]
    fn test_stop_persists() {
        let (tmp, mut host) = host_with(&["i1"]);
        host.stop("i1").unwrap();
        host.flush().unwrap();
        let reopened = FileHost::open(tmp.path()).unwrap();
        assert!(!reopened.is_started("i1"));
    }

    #[test]
    fn test_delete_removes_directory() {
        let (tmp, mut host) = host_with(&["i1"]);
        host.flush().unwrap();
        host.delete_instance("i1").unwrap();
        host.flush().unwrap();
        assert!(!host.instance_dir("i1").exists());
        assert!(FileHost::open(tmp.path()).unwrap().instances().unwrap().is_empty());
    }

    #[test]
    fn test_create_twice_fails() {
        let (tmp, mut host) = host_with(&["i1"]);
        let err = host
            .create_instance(&InstanceTemplate::new("i1", &tmp.path().to_string_lossy()))
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_backend_add_creates_indexes() {
        let (_tmp, mut host) = host_with(&["i1"]);
        let backend = Entry::with_attrs(
            "cn=userRoot,cn=ldbm database,cn=plugins,cn=config",
            [
                ("objectclass", vec!["top", "extensibleObject", "nsBackendInstance"]),
                ("cn", vec!["userRoot"]),
                ("nsslapd-suffix", vec!["dc=example,dc=com"]),
            ],
        )
        .unwrap();
        host.write("i1", &Operation::AddEntry(backend)).unwrap();

        let snapshot = host.snapshot("i1").unwrap().unwrap();
        assert!(
            snapshot
                .get("cn=parentid,cn=index,cn=userroot,cn=ldbm database,cn=plugins,cn=config")
                .is_some()
        );
    }

    #[test]
    fn test_offline_attribute_refused_while_started() {
        let (_tmp, mut host) = host_with(&["i1"]);
        let op = Operation::modify(
            Dn::new("cn=config"),
            Modification::replace("nsslapd-suffix", vec!["dc=x".into()]),
        );
        let err = host.write("i1", &op).unwrap_err();
        assert!(matches!(err, Error::RequiresOffline { .. }));

        host.stop("i1").unwrap();
        host.write("i1", &op).unwrap();
    }

    #[test]
    fn test_root_password_bind() {
        let tmp = TempDir::new().unwrap();
        let mut host = FileHost::open(tmp.path()).unwrap();
        let mut template = InstanceTemplate::new("i1", "");
        template.set("root_password", &"secret12".into());
        host.create_instance(&template).unwrap();

        let snapshot = host.snapshot("i1").unwrap().unwrap();
        let stored = snapshot.single_value("cn=config", "nsslapd-rootpw").unwrap();
        assert!(stored.starts_with(password::SCHEME));

        assert!(host.check_bind("i1", "cn=directory manager", "secret12").unwrap());
        assert!(!host.check_bind("i1", "cn=Directory Manager", "wrong").unwrap());
        assert!(!host.check_bind("i2", "cn=Directory Manager", "secret12").unwrap());
    }
}
