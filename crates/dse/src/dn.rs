//! Distinguished name and value normalization.
//!
//! Snapshot keys are compared on a canonical form: attribute types and values
//! lower-cased, whitespace around separators dropped, quoted and escaped
//! values decoded then re-escaped with hex pairs (`,` becomes `\2c`, `=`
//! becomes `\3d`). A DN that cannot be decoded is kept as lower-cased text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized distinguished name.
///
/// Two DNs differing only in case, incidental whitespace or escaping style
/// are equal once wrapped in `Dn`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Dn(String);

impl Dn {
    /// Normalize a DN, falling back to lower-cased text when it does not parse.
    pub fn new(raw: &str) -> Self {
        match parse_rdns(raw) {
            Some(rdns) => Self(encode_rdns(&rdns)),
            None => Self(raw.trim().to_lowercase()),
        }
    }

    /// Normalize a DN, returning `None` when the text is not a valid DN.
    pub fn parse(raw: &str) -> Option<Self> {
        parse_rdns(raw).map(|rdns| Self(encode_rdns(&rdns)))
    }

    /// The empty (root) DN.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The RDN components, leftmost first.
    pub fn rdns(&self) -> Vec<&str> {
        if self.0.is_empty() {
            return Vec::new();
        }
        // Separators inside values are always hex-escaped after normalization.
        self.0.split(',').collect()
    }

    /// Number of RDN components.
    pub fn depth(&self) -> usize {
        self.rdns().len()
    }

    /// The DN one level up, or `None` for the root DN.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(match self.0.split_once(',') {
            Some((_, rest)) => Self(rest.to_string()),
            None => Self::root(),
        })
    }

    /// The value of the leftmost RDN (still escaped), e.g. `userroot` for
    /// `cn=userroot,cn=ldbm database,...`.
    pub fn rdn_value(&self) -> Option<&str> {
        let first = self.rdns().into_iter().next()?;
        first.split_once('=').map(|(_, v)| v)
    }

    /// Whether `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Dn) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.ends_with(&ancestor.0)
            && self.0.as_bytes()[self.0.len() - ancestor.0.len() - 1] == b','
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Dn {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for Dn {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Dn> for String {
    fn from(dn: Dn) -> Self {
        dn.0
    }
}

/// Normalize an attribute value for comparison.
///
/// Values shaped like a DN are DN-canonicalized, everything else is
/// case-folded.
pub fn normalize_value(value: &str) -> String {
    if value.contains('=') {
        if let Some(dn) = Dn::parse(value) {
            return dn.0;
        }
    }
    value.to_lowercase()
}

/// Whether two attribute values are equal under normalization.
pub fn values_equal(a: &str, b: &str) -> bool {
    a == b || normalize_value(a) == normalize_value(b)
}

/// Escape a string so it can be embedded as a single RDN value (RFC 4514).
///
/// Used to build DNs whose RDN is itself a DN, such as mapping-tree entries
/// named after a suffix.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let count = value.chars().count();
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' => out.push_str("\\2c"),
            '=' => out.push_str("\\3d"),
            '+' => out.push_str("\\2b"),
            '"' => out.push_str("\\22"),
            '\\' => out.push_str("\\5c"),
            '<' => out.push_str("\\3c"),
            '>' => out.push_str("\\3e"),
            ';' => out.push_str("\\3b"),
            '#' if i == 0 => out.push_str("\\23"),
            ' ' if i == 0 || i + 1 == count => out.push_str("\\20"),
            _ => out.push(c),
        }
    }
    out
}

/// One attribute-type/value pair of an RDN, value decoded.
type Ava = (String, String);

fn encode_rdns(rdns: &[Vec<Ava>]) -> String {
    rdns.iter()
        .map(|avas| {
            avas.iter()
                .map(|(t, v)| format!("{t}={}", escape_value(&v.to_lowercase())))
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn is_valid_type(t: &str) -> bool {
    let mut chars = t.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ';')
        }
        Some(c) if c.is_ascii_digit() => t.chars().all(|c| c.is_ascii_digit() || c == '.'),
        _ => false,
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode a DN into RDNs of (type, value) pairs.
fn parse_rdns(raw: &str) -> Option<Vec<Vec<Ava>>> {
    let bytes = raw.trim().as_bytes();
    if bytes.is_empty() {
        return Some(Vec::new());
    }

    let mut rdns = Vec::new();
    let mut avas = Vec::new();
    let mut pos = 0;

    loop {
        // Attribute type
        let start = pos;
        while pos < bytes.len() && bytes[pos] != b'=' {
            pos += 1;
        }
        if pos >= bytes.len() {
            return None;
        }
        let attr_type = std::str::from_utf8(&bytes[start..pos]).ok()?.trim();
        if !is_valid_type(attr_type) {
            return None;
        }
        pos += 1;

        // Attribute value
        while pos < bytes.len() && bytes[pos] == b' ' {
            pos += 1;
        }
        let mut value: Vec<u8> = Vec::new();
        if pos < bytes.len() && bytes[pos] == b'"' {
            pos += 1;
            loop {
                match bytes.get(pos) {
                    None => return None,
                    Some(b'"') => {
                        pos += 1;
                        break;
                    }
                    Some(b'\\') => {
                        let next = *bytes.get(pos + 1)?;
                        value.push(next);
                        pos += 2;
                    }
                    Some(&b) => {
                        value.push(b);
                        pos += 1;
                    }
                }
            }
            while pos < bytes.len() && bytes[pos] == b' ' {
                pos += 1;
            }
        } else {
            // Escaped spaces are significant, unescaped trailing ones are not.
            let mut significant = 0;
            while pos < bytes.len() {
                match bytes[pos] {
                    b',' | b';' | b'+' => break,
                    b'\\' => {
                        let next = *bytes.get(pos + 1)?;
                        match bytes.get(pos + 2).and_then(|b| hex_val(*b)) {
                            Some(lo) if hex_val(next).is_some() => {
                                value.push(hex_val(next)? * 16 + lo);
                                pos += 3;
                            }
                            _ => {
                                value.push(next);
                                pos += 2;
                            }
                        }
                        significant = value.len();
                    }
                    b => {
                        value.push(b);
                        if b != b' ' {
                            significant = value.len();
                        }
                        pos += 1;
                    }
                }
            }
            value.truncate(significant);
        }

        avas.push((attr_type.to_lowercase(), String::from_utf8(value).ok()?));

        match bytes.get(pos) {
            None => {
                rdns.push(std::mem::take(&mut avas));
                break;
            }
            Some(b'+') => {
                pos += 1;
            }
            Some(b',' | b';') => {
                rdns.push(std::mem::take(&mut avas));
                pos += 1;
                while pos < bytes.len() && bytes[pos] == b' ' {
                    pos += 1;
                }
            }
            Some(_) => return None,
        }
    }

    Some(rdns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_spacing_normalize() {
        let a = Dn::new("cn=UserRoot, cn=LDBM Database,cn=plugins, cn=config");
        let b = Dn::new("cn=userroot,cn=ldbm database,cn=plugins,cn=config");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "cn=userroot,cn=ldbm database,cn=plugins,cn=config");
    }

    #[test]
    fn test_escaped_suffix_forms_are_equal() {
        let quoted = Dn::new(r#"cn="dc=example,dc=com",cn=mapping tree,cn=config"#);
        let escaped = Dn::new(r"cn=dc\=example\,dc\=com,cn=mapping tree,cn=config");
        let hex = Dn::new(r"cn=dc\3Dexample\2Cdc\3Dcom,cn=mapping tree,cn=config");
        assert_eq!(quoted, escaped);
        assert_eq!(escaped, hex);
        assert_eq!(
            hex.as_str(),
            r"cn=dc\3dexample\2cdc\3dcom,cn=mapping tree,cn=config"
        );
    }

    #[test]
    fn test_unparseable_falls_back_to_lowercase() {
        assert_eq!(Dn::new("Not A DN").as_str(), "not a dn");
        assert!(Dn::parse("Not A DN").is_none());
    }

    #[test]
    fn test_parent_and_depth() {
        let dn = Dn::new("cn=replica,cn=o\\3dtest,cn=mapping tree,cn=config");
        assert_eq!(dn.depth(), 4);
        let parent = dn.parent().unwrap();
        assert_eq!(parent.as_str(), "cn=o\\3dtest,cn=mapping tree,cn=config");
        assert!(dn.is_descendant_of(&parent));
        assert!(!parent.is_descendant_of(&dn));
        assert_eq!(Dn::new("cn=config").parent(), Some(Dn::root()));
    }

    #[test]
    fn test_rdn_value() {
        let dn = Dn::new("cn=UserRoot,cn=ldbm database,cn=plugins,cn=config");
        assert_eq!(dn.rdn_value(), Some("userroot"));
    }

    #[test]
    fn test_descendant_requires_rdn_boundary() {
        let a = Dn::new("cn=xconfig");
        let b = Dn::new("cn=config");
        assert!(!a.is_descendant_of(&b));
    }

    #[test]
    fn test_value_normalization() {
        assert!(values_equal("ON", "on"));
        assert!(values_equal("cn=Directory Manager", "CN=directory manager"));
        assert!(values_equal("dc=example, dc=com", "dc=example,dc=com"));
        assert!(!values_equal("on", "off"));
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("dc=example,dc=com"), r"dc\3dexample\2cdc\3dcom");
        assert_eq!(escape_value(" lead"), r"\20lead");
        assert_eq!(escape_value("#x"), r"\23x");
    }

    #[test]
    fn test_multi_valued_rdn() {
        let dn = Dn::new("cn=a + sn=B,o=x");
        assert_eq!(dn.as_str(), "cn=a+sn=b,o=x");
    }
}
