//! # dirsrv
//!
//! Desired-state convergence for 389 Directory Server.
//!
//! This crate provides functionality for:
//! - Declaring instances, backends, indexes and replication agreements as a
//!   nested document (YAML, JSON or TOML)
//! - Rebuilding the same tree from the live configuration ("facts")
//! - Reconciling the two with the smallest set of native write operations
//! - Moving replicas between standalone, consumer, hub and supplier roles
//! - Checking replication topology before anything is written
//!
//! ## Example
//!
//! ```no_run
//! use declarative::{ApplyContext, LogReporter};
//! use dirsrv::{DesiredState, FileHost, Format, Reconciler};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), dirsrv::Error> {
//! let desired = DesiredState::parse(
//!     "instances: [{name: i1, backends: [{name: userroot, suffix: dc=example,dc=com}]}]",
//!     Format::Yaml,
//! )?;
//! let mut host = FileHost::open(Path::new("/"))?;
//! let mut reporter = LogReporter;
//! let mut ctx = ApplyContext::new(false, &mut reporter);
//! let summary = Reconciler::new(&mut host).update(&desired, &mut ctx)?;
//! host.flush()?;
//! println!("changed: {}", summary.changed());
//! # Ok(())
//! # }
//! ```

pub mod behavior;
pub mod desired;
pub mod error;
pub mod facts;
pub mod host;
pub mod model;
pub mod password;
pub mod reconcile;
pub mod replica;
pub mod schema;
pub mod template;
pub mod topology;

// Re-export main types at crate root
pub use desired::{DesiredState, Format};
pub use error::{Error, ErrorCategory, Result};
pub use host::{DirectoryHost, FileHost};
pub use model::{Entity, EntityTree, to_record};
pub use reconcile::{Reconciler, filter_operations};
pub use replica::Role;
pub use schema::EntityKind;
