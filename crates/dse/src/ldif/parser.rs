//! Parser for the dse.ldif record format.
//!
//! ```text
//! version: 1
//!
//! dn: cn=config
//! objectClass: top
//! objectClass: nsslapdConfig
//! nsslapd-port: 389
//! description:: ZW5jb2RlZA==
//! ```
//!
//! Records are blank-line separated and must start with a `dn:` line. Long
//! lines are folded onto continuation lines starting with a single space.

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

/// Read a snapshot from a file.
///
/// A missing file yields [`Error::NotPresent`].
pub fn parse_file(path: &Path) -> Result<Snapshot> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotPresent(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    log::debug!("Parsing {}", path.display());
    parse_string(&content)
}

/// Read a snapshot from a file, mapping a missing file to `None`.
pub fn read_optional(path: &Path) -> Result<Option<Snapshot>> {
    match parse_file(path) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) if e.is_not_present() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse a snapshot from a string.
pub fn parse_string(content: &str) -> Result<Snapshot> {
    Ok(Snapshot::from_entries(parse_entries(content)?))
}

/// Parse raw entries without building the class index.
pub fn parse_entries(content: &str) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut record: Vec<(usize, String)> = Vec::new();
    let mut first_record = true;

    for (line_num, line) in unfold(content) {
        if line.is_empty() {
            if !record.is_empty() {
                if let Some(entry) = parse_record(&record, first_record)? {
                    entries.push(entry);
                }
                first_record = false;
                record.clear();
            }
            continue;
        }
        record.push((line_num, line));
    }
    if !record.is_empty() {
        if let Some(entry) = parse_record(&record, first_record)? {
            entries.push(entry);
        }
    }

    Ok(entries)
}

/// Join continuation lines and drop comments.
///
/// Yields (1-indexed line number, logical line). Blank lines are kept as
/// empty strings since they separate records.
fn unfold(content: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    let mut in_comment = false;

    for (idx, raw) in content.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix(' ') {
            if in_comment {
                continue;
            }
            if let Some((_, last)) = lines.last_mut() {
                if !last.is_empty() {
                    last.push_str(rest);
                    continue;
                }
            }
            // A lone indented line outside a record is a value-less line.
            lines.push((idx + 1, raw.trim().to_string()));
            continue;
        }
        if raw.starts_with('#') {
            in_comment = true;
            continue;
        }
        in_comment = false;
        lines.push((idx + 1, raw.to_string()));
    }

    lines
}

/// Parse one record. Returns `None` for a lone `version:` header.
fn parse_record(lines: &[(usize, String)], first_record: bool) -> Result<Option<Entry>> {
    let mut lines = lines;

    if first_record {
        if let Some((_, first)) = lines.first() {
            if first.to_lowercase().starts_with("version:") {
                lines = &lines[1..];
                if lines.is_empty() {
                    return Ok(None);
                }
            }
        }
    }

    let Some((dn_line, first)) = lines.first() else {
        return Ok(None);
    };
    let (attr, dn) = parse_line(first, *dn_line)?;
    if attr != "dn" {
        return Err(Error::Parse {
            line: *dn_line,
            message: format!("record must start with a dn line, found '{attr}'"),
        });
    }

    let mut entry = Entry::new(&dn.text);
    for (line_num, line) in &lines[1..] {
        let (attr, value) = parse_line(line, *line_num)?;
        if attr == "dn" {
            return Err(Error::Parse {
                line: *line_num,
                message: "dn line inside a record (missing blank line?)".to_string(),
            });
        }
        if attr == "changetype" {
            return Err(Error::Parse {
                line: *line_num,
                message: "change records are not supported".to_string(),
            });
        }
        if value.binary {
            entry.mark_binary(&attr);
        }
        entry
            .add_value(&attr, value.text)
            .map_err(|e| Error::Parse {
                line: *line_num,
                message: e.to_string(),
            })?;
    }

    Ok(Some(entry))
}

/// A decoded attribute value.
struct LineValue {
    text: String,
    /// Base64 payload that is not UTF-8 and is kept encoded
    binary: bool,
}

/// Split `attr: value` / `attr:: base64` into a lower-cased name and value.
fn parse_line(line: &str, line_num: usize) -> Result<(String, LineValue)> {
    let Some((attr, rest)) = line.split_once(':') else {
        return Err(Error::Parse {
            line: line_num,
            message: format!("missing ':' in '{line}'"),
        });
    };
    let attr = attr.trim().to_lowercase();
    if attr.is_empty() {
        return Err(Error::Parse {
            line: line_num,
            message: "empty attribute name".to_string(),
        });
    }

    if let Some(encoded) = rest.strip_prefix(':') {
        let encoded = encoded.trim();
        let bytes = STANDARD.decode(encoded).map_err(|e| Error::Parse {
            line: line_num,
            message: format!("invalid base64 value for {attr}: {e}"),
        })?;
        return Ok(match String::from_utf8(bytes) {
            Ok(text) => (attr, LineValue {
                text,
                binary: false,
            }),
            Err(_) => (attr, LineValue {
                text: encoded.to_string(),
                binary: true,
            }),
        });
    }

    if rest.starts_with('<') {
        return Err(Error::Parse {
            line: line_num,
            message: format!("URL values are not supported ({attr})"),
        });
    }

    Ok((attr, LineValue {
        text: rest.trim_start_matches(' ').to_string(),
        binary: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::KnownClass;

    const SAMPLE: &str = "version: 1

# Top level configuration
dn: cn=config
objectClass: top
objectClass: extensibleObject
objectClass: nsslapdConfig
cn: config
nsslapd-port: 389
modifyTimestamp: 20240101000000Z
nsslapd-rootdn: cn=Directory Manager

dn: cn=userRoot,cn=ldbm database,cn=plugins,cn=config
objectClass: top
objectClass: extensibleObject
objectClass: nsBackendInstance
cn: userRoot
nsslapd-suffix: dc=example,
 dc=com
";

    #[test]
    fn test_parse_sample() {
        let snap = parse_string(SAMPLE).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.single_value("cn=config", "nsslapd-port"), Some("389"));
        assert_eq!(snap.dns_of(KnownClass::NsBackendInstance).len(), 1);
    }

    #[test]
    fn test_folded_lines_are_joined() {
        let snap = parse_string(SAMPLE).unwrap();
        assert_eq!(
            snap.single_value(
                "cn=userroot,cn=ldbm database,cn=plugins,cn=config",
                "nsslapd-suffix"
            ),
            Some("dc=example,dc=com")
        );
    }

    #[test]
    fn test_ignored_attribute_not_kept() {
        let snap = parse_string(SAMPLE).unwrap();
        assert!(!snap.get("cn=config").unwrap().has_attr("modifytimestamp"));
    }

    #[test]
    fn test_base64_value() {
        let snap = parse_string("dn: cn=x\ndescription:: aGVsbG8gd29ybGQ=\n").unwrap();
        assert_eq!(snap.single_value("cn=x", "description"), Some("hello world"));
    }

    #[test]
    fn test_binary_value_kept_encoded() {
        let snap = parse_string("dn: cn=AES\nnssymmetrickey:: //79\n").unwrap();
        let entry = snap.get("cn=aes").unwrap();
        assert!(entry.is_binary("nsSymmetricKey"));
        assert_eq!(entry.first("nssymmetrickey"), Some("//79"));
    }

    #[test]
    fn test_record_without_dn_is_fatal() {
        let err = parse_string("cn: config\nnsslapd-port: 389\n").unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_colon_is_fatal() {
        let err = parse_string("dn: cn=config\nbroken line\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_duplicate_value_is_fatal() {
        let err = parse_string("dn: cn=x\ncn: x\ncn: X\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));
    }

    #[test]
    fn test_missing_file_is_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dse.ldif");
        assert!(parse_file(&path).unwrap_err().is_not_present());
        assert!(read_optional(&path).unwrap().is_none());
    }

    #[test]
    fn test_comment_continuation_skipped() {
        let snap = parse_string("# long comment\n continued\ndn: cn=x\ncn: x\n").unwrap();
        assert_eq!(snap.len(), 1);
    }
}
