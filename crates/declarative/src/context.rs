//! Apply context and provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific logger or prompt implementation.

/// Receiver for messages emitted during a reconciliation pass
///
/// Passed explicitly through [`ApplyContext`] so every pass owns its own
/// output instead of writing to global state.
pub trait Reporter {
    /// A change that was (or would be) made
    fn change(&mut self, message: &str);

    /// Diagnostic detail
    fn debug(&mut self, message: &str);

    /// Something suspicious that does not stop the pass
    fn warn(&mut self, message: &str);
}

/// Reporter forwarding to the `log` facade
pub struct LogReporter;

impl Reporter for LogReporter {
    fn change(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn debug(&mut self, message: &str) {
        log::debug!("{message}");
    }

    fn warn(&mut self, message: &str) {
        log::warn!("{message}");
    }
}

/// Reporter keeping every message in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    pub changes: Vec<String>,
    pub debug: Vec<String>,
    pub warnings: Vec<String>,
}

impl Reporter for MemoryReporter {
    fn change(&mut self, message: &str) {
        self.changes.push(message.to_string());
    }

    fn debug(&mut self, message: &str) {
        self.debug.push(message.to_string());
    }

    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

/// Context passed through one reconciliation pass
pub struct ApplyContext<'a> {
    /// Whether this is a dry run (describe only, no writes)
    pub dry_run: bool,
    /// Where messages go
    pub reporter: &'a mut dyn Reporter,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(dry_run: bool, reporter: &'a mut dyn Reporter) -> Self {
        Self { dry_run, reporter }
    }
}
