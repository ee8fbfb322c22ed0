//! Writer for dse.ldif content.
//!
//! Entries are written parent-first so the file can be loaded top-down, with
//! `objectClass` leading each record.

use crate::entry::Entry;
use crate::snapshot::Snapshot;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write;
use std::path::Path;

/// Options for writing LDIF.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Fold lines longer than this many bytes
    pub wrap: Option<usize>,
    /// Emit a `version: 1` header
    pub header: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            wrap: Some(78),
            header: false,
        }
    }
}

/// Write a snapshot to a file.
pub fn write_file(snapshot: &Snapshot, path: &Path, options: &WriteOptions) -> std::io::Result<()> {
    let content = write_string(snapshot, options);
    std::fs::write(path, content)
}

/// Write a snapshot to a string.
pub fn write_string(snapshot: &Snapshot, options: &WriteOptions) -> String {
    write_entries(snapshot.entries(), options)
}

/// Write arbitrary entries, ordered parent-first.
pub fn write_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>, options: &WriteOptions) -> String {
    let mut entries: Vec<&Entry> = entries.into_iter().collect();
    entries.sort_by(|a, b| {
        a.dn.depth()
            .cmp(&b.dn.depth())
            .then_with(|| a.dn.cmp(&b.dn))
    });

    let mut output = String::new();
    if options.header {
        output.push_str("version: 1\n\n");
    }

    for entry in entries {
        write_entry(&mut output, entry, options);
        output.push('\n');
    }

    output
}

fn write_entry(output: &mut String, entry: &Entry, options: &WriteOptions) {
    write_line(output, "dn", &entry.raw_dn, false, options);

    if let Some(classes) = entry.values("objectclass") {
        for value in classes {
            write_line(output, "objectClass", value, false, options);
        }
    }
    for (attr, values) in entry.attributes() {
        if attr == "objectclass" {
            continue;
        }
        let binary = entry.is_binary(attr);
        for value in values {
            write_line(output, attr, value, binary, options);
        }
    }
}

fn write_line(output: &mut String, attr: &str, value: &str, binary: bool, options: &WriteOptions) {
    let line = if binary {
        format!("{attr}:: {value}")
    } else if needs_base64(value) {
        format!("{attr}:: {}", STANDARD.encode(value))
    } else {
        format!("{attr}: {value}")
    };

    match options.wrap {
        Some(width) if width > 1 && line.len() > width => fold(output, &line, width),
        _ => {
            let _ = writeln!(output, "{line}");
        }
    }
}

/// Whether a value cannot be written as a plain `SAFE-STRING`.
fn needs_base64(value: &str) -> bool {
    value.starts_with([' ', ':', '<'])
        || value.ends_with(' ')
        || value
            .chars()
            .any(|c| !c.is_ascii() || c == '\n' || c == '\r' || c == '\0')
}

/// Split a line into chunks, continuation lines start with one space.
fn fold(output: &mut String, line: &str, width: usize) {
    let mut rest = line;
    let mut limit = width;
    let mut first = true;
    while !rest.is_empty() {
        let mut cut = limit.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        if !first {
            output.push(' ');
        }
        output.push_str(&rest[..cut]);
        output.push('\n');
        rest = &rest[cut..];
        first = false;
        limit = width - 1;
    }
}
