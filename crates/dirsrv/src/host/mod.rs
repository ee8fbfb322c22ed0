//! The directory host boundary.
//!
//! Everything the reconciler needs from the outside world goes through
//! [`DirectoryHost`]: discovering instances, reading their snapshots,
//! creating or removing them, starting or stopping them and issuing the
//! four native write primitives.

mod file;

pub use file::{FileHost, HostState, InstanceRecord};

use crate::error::Result;
use crate::template::InstanceTemplate;
use dse::{Modification, Operation, Snapshot};
use std::path::Path;

/// Operations the reconciler performs against directory server instances.
pub trait DirectoryHost {
    /// Installation prefix this host manages
    fn prefix(&self) -> &Path;

    /// Names of the existing instances, sorted
    fn instances(&self) -> Result<Vec<String>>;

    /// Current snapshot of an instance, `None` when it does not exist
    fn snapshot(&self, instance: &str) -> Result<Option<Snapshot>>;

    /// Factory default snapshot of an instance
    fn default_snapshot(&self, instance: &str) -> Result<Snapshot> {
        InstanceTemplate::new(instance, &self.prefix().to_string_lossy()).snapshot()
    }

    fn create_instance(&mut self, template: &InstanceTemplate) -> Result<()>;

    fn delete_instance(&mut self, instance: &str) -> Result<()>;

    /// Whether the instance is running; `false` when it does not exist
    fn is_started(&self, instance: &str) -> bool;

    fn start(&mut self, instance: &str) -> Result<()>;

    fn stop(&mut self, instance: &str) -> Result<()>;

    /// Issue one native write operation
    fn write(&mut self, instance: &str, op: &Operation) -> Result<()>;

    /// Whether `dn` can bind with `password`
    fn check_bind(&self, instance: &str, dn: &str, password: &str) -> Result<bool>;
}

/// Issue a write, turning an add that finds its entry already there into a
/// modify of the attributes it carries.
pub fn write_or_update(host: &mut dyn DirectoryHost, instance: &str, op: &Operation) -> Result<()> {
    match host.write(instance, op) {
        Err(err) if err.is_recoverable() => {
            let Operation::AddEntry(entry) = op else {
                return Err(err);
            };
            log::debug!("{} already exists, updating it instead", entry.raw_dn);
            let mods: Vec<Modification> = entry
                .attributes()
                .map(|(attr, values)| Modification::replace(attr, values.to_vec()))
                .collect();
            host.write(
                instance,
                &Operation::Modify {
                    dn: entry.dn.clone(),
                    mods,
                },
            )
        }
        other => other,
    }
}
