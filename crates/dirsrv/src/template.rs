//! Instance creation template.
//!
//! A new instance starts from an embedded factory dse.ldif whose `{field}`
//! placeholders are filled from the creation template. Rendering the same
//! template with no fields set gives the factory defaults every observed
//! snapshot is compared against.

use crate::error::Result;
use declarative::Value;
use dse::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The factory dse.ldif with `{field}` placeholders.
pub const DEFAULT_DSE: &str = include_str!("../resources/default-dse.ldif");

/// Fields collected from the options of an instance being created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTemplate {
    pub name: String,
    pub prefix: String,
    fields: BTreeMap<String, String>,
}

impl InstanceTemplate {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.trim_end_matches('/').to_string(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field; lists are joined with spaces.
    pub fn set(&mut self, field: &str, value: &Value) {
        self.fields
            .insert(field.to_string(), value.to_list().join(" "));
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of a field, falling back to the factory default.
    pub fn value(&self, field: &str) -> Option<String> {
        if let Some(v) = self.fields.get(field) {
            return Some(v.clone());
        }
        let prefix = &self.prefix;
        let name = &self.name;
        let value = match field {
            "instance_name" => name.clone(),
            "port" => "389".to_string(),
            "secure_port" => "636".to_string(),
            "root_dn" => "cn=Directory Manager".to_string(),
            "root_password" => String::new(),
            "full_machine_name" => "localhost".to_string(),
            "user" | "group" => "dirsrv".to_string(),
            "db_lib" => "bdb".to_string(),
            "backup_dir" => format!("{prefix}/var/lib/dirsrv/slapd-{name}/bak"),
            "bin_dir" => format!("{prefix}/usr/bin"),
            "cert_dir" => format!("{prefix}/etc/dirsrv/slapd-{name}"),
            "db_dir" | "db_home_dir" => format!("{prefix}/var/lib/dirsrv/slapd-{name}/db"),
            "ldif_dir" => format!("{prefix}/var/lib/dirsrv/slapd-{name}/ldif"),
            "lock_dir" => format!("{prefix}/var/lock/dirsrv/slapd-{name}"),
            "log_dir" => format!("{prefix}/var/log/dirsrv/slapd-{name}"),
            "run_dir" => format!("{prefix}/var/run/dirsrv"),
            "schema_dir" => format!("{prefix}/etc/dirsrv/slapd-{name}/schema"),
            "tmp_dir" => "/tmp".to_string(),
            "ldapi" => format!("{prefix}/var/run/slapd-{name}.socket"),
            _ => return None,
        };
        Some(value)
    }

    /// The factory dse.ldif with placeholders filled in.
    ///
    /// An attribute line whose placeholder resolves to nothing is dropped.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(DEFAULT_DSE.len());
        for line in DEFAULT_DSE.lines() {
            let rendered = self.fill(line);
            if line.contains('{') && rendered.trim_end().ends_with(':') {
                continue;
            }
            out.push_str(&rendered);
            out.push('\n');
        }
        out
    }

    /// The rendered template as a snapshot.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(dse::ldif::parse_string(&self.render())?)
    }

    fn fill(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let field = &after[..end];
            match self.value(field) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[start..=start + end + 1]),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_render() {
        let template = InstanceTemplate::new("i1", "/opt/ds/");
        let snapshot = template.snapshot().unwrap();
        assert_eq!(snapshot.single_value("cn=config", "nsslapd-port"), Some("389"));
        assert_eq!(
            snapshot.single_value(
                "cn=config,cn=ldbm database,cn=plugins,cn=config",
                "nsslapd-directory"
            ),
            Some("/opt/ds/var/lib/dirsrv/slapd-i1/db")
        );
        // No password set: the attribute is left out.
        assert_eq!(snapshot.single_value("cn=config", "nsslapd-rootpw"), None);
    }

    #[test]
    fn test_fields_override_defaults() {
        let mut template = InstanceTemplate::new("i1", "");
        template.set("port", &Value::text("3389"));
        template.set("root_dn", &Value::text("cn=admin"));
        let snapshot = template.snapshot().unwrap();
        assert_eq!(snapshot.single_value("cn=config", "nsslapd-port"), Some("3389"));
        assert_eq!(snapshot.single_value("cn=config", "nsslapd-rootdn"), Some("cn=admin"));
    }

    #[test]
    fn test_default_indexes_present() {
        let snapshot = InstanceTemplate::new("i1", "").snapshot().unwrap();
        assert!(
            snapshot
                .get("cn=parentid,cn=default indexes,cn=config,cn=ldbm database,cn=plugins,cn=config")
                .is_some()
        );
        assert!(!snapshot.dns_of(dse::KnownClass::NsIndex).is_empty());
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let template = InstanceTemplate::new("i1", "");
        assert_eq!(template.fill("x: {nope}"), "x: {nope}");
    }
}
