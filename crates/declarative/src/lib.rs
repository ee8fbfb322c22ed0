//! # Declarative
//!
//! A toolkit for declarative configuration convergence.
//!
//! This crate provides the schema-level abstractions for declaring desired
//! state, comparing it to observed state and ordering the resulting work.
//!
//! ## Core Concepts
//!
//! - **OptionSpec**: Immutable descriptor of one configurable option, built at compile time
//! - **Value**: Text or list value compared case-insensitively
//! - **OptionAction**: One option whose desired value differs from the observed one
//! - **Tree**: Arena of entities with parent/child links stored as indices
//! - **EntityState**: Lifecycle state deciding create/delete/reconcile
//!
//! ## Example
//!
//! ```
//! use declarative::{OptionSpec, Value, plan};
//!
//! struct Stored;
//!
//! static OPTIONS: &[OptionSpec<Stored>] = &[
//!     OptionSpec::new("port", "listen port", &Stored).default("389"),
//!     OptionSpec::new("state", "entity state", &Stored).prio(2),
//! ];
//!
//! let actions = plan(
//!     OPTIONS,
//!     |name| (name == "port").then(|| Value::text("3389")),
//!     |_| None,
//! );
//! assert_eq!(actions.len(), 1);
//! assert_eq!(actions[0].describe(), "Set port: None ==> 3389");
//! ```
//!
//! ## Provider Traits
//!
//! - [`Reporter`]: Receives change and diagnostic messages
//!
//! This allows the crate to be used without a hard dependency on a
//! specific logger.

pub mod action;
pub mod context;
pub mod error;
pub mod option;
pub mod state;
pub mod summary;
pub mod tree;
pub mod value;

// Re-export main types at crate root
pub use action::{OptionAction, plan};
pub use context::{ApplyContext, LogReporter, MemoryReporter, Reporter};
pub use error::{Error, Result};
pub use option::{OptionSpec, Storage, ValueKind, by_weight};
pub use state::{EntityState, Transition};
pub use summary::ChangeSummary;
pub use tree::{NodeId, Tree};
pub use value::Value;
