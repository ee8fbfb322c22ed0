//! Option descriptors.
//!
//! An [`OptionSpec`] is immutable schema: where the value is stored, how it
//! is checked and which behavior carries out each phase of an action. Tables
//! of them are built at compile time with the `const` builder methods.

use crate::error::{Error, Result};
use crate::value::Value;
use std::cmp::Ordering;

/// Shape of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Free text
    Text,
    /// Non-negative or negative integer
    Int,
    /// `true`/`false`, canonicalized
    Bool,
    /// `on`/`off`, canonicalized
    Switch,
    /// Multi-valued
    List,
}

/// Persisted location of an option: attribute name and entry DN template.
///
/// The template may use `{prefix}`, `{instance}`, `{backend}`, `{suffix}`,
/// `{index}` and `{agreement}` placeholders resolved against the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Storage {
    pub attr: &'static str,
    pub dn: &'static str,
}

/// Schema descriptor of one option.
pub struct OptionSpec<B: ?Sized + 'static> {
    pub name: &'static str,
    pub desc: &'static str,
    /// Execution order, lower first
    pub prio: u8,
    pub storage: Option<Storage>,
    /// Field of the creation template the option feeds
    pub template: Option<&'static str>,
    pub default: Option<&'static str>,
    pub required: bool,
    pub readonly: bool,
    /// Value is a secret and never displayed
    pub hidden: bool,
    pub choices: &'static [&'static str],
    pub kind: ValueKind,
    pub behavior: &'static B,
}

impl<B: ?Sized + 'static> OptionSpec<B> {
    /// Default priority of plain options.
    pub const DEFAULT_PRIO: u8 = 10;

    pub const fn new(name: &'static str, desc: &'static str, behavior: &'static B) -> Self {
        Self {
            name,
            desc,
            prio: Self::DEFAULT_PRIO,
            storage: None,
            template: None,
            default: None,
            required: false,
            readonly: false,
            hidden: false,
            choices: &[],
            kind: ValueKind::Text,
            behavior,
        }
    }

    pub const fn prio(self, prio: u8) -> Self {
        Self { prio, ..self }
    }

    pub const fn stored(self, attr: &'static str, dn: &'static str) -> Self {
        Self {
            storage: Some(Storage { attr, dn }),
            ..self
        }
    }

    pub const fn template(self, field: &'static str) -> Self {
        Self {
            template: Some(field),
            ..self
        }
    }

    pub const fn default(self, value: &'static str) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn readonly(self) -> Self {
        Self {
            readonly: true,
            ..self
        }
    }

    pub const fn hidden(self) -> Self {
        Self {
            hidden: true,
            ..self
        }
    }

    pub const fn choices(self, choices: &'static [&'static str]) -> Self {
        Self { choices, ..self }
    }

    pub const fn kind(self, kind: ValueKind) -> Self {
        Self { kind, ..self }
    }

    /// Persisted attribute name, if any.
    pub fn attr(&self) -> Option<&'static str> {
        self.storage.map(|s| s.attr)
    }

    /// The default as a value.
    pub fn default_value(&self) -> Option<Value> {
        self.default.map(|d| self.canonical(Value::text(d)))
    }

    /// Whether `to` differs from `from`, or from the default when `from` is unset.
    pub fn differs(&self, from: Option<&Value>, to: &Value) -> bool {
        match from.cloned().or_else(|| self.default_value()) {
            Some(current) => !current.matches(to),
            None => true,
        }
    }

    /// Value as displayed, masked when hidden.
    pub fn display(&self, value: Option<&Value>) -> String {
        match value {
            Some(_) if self.hidden => "******".to_string(),
            Some(v) => v.to_string(),
            None => "None".to_string(),
        }
    }

    /// Check a desired value and bring it to canonical form.
    pub fn check(&self, path: &str, value: Value) -> Result<Value> {
        let invalid = |message: String| Error::InvalidValue {
            path: path.to_string(),
            option: self.name.to_string(),
            message,
        };

        let value = match (self.kind, value) {
            (ValueKind::List, v) => Value::List(v.to_list()),
            (_, Value::List(mut items)) if items.len() == 1 => Value::Text(items.remove(0)),
            (_, Value::List(_)) => return Err(invalid("expected a single value".to_string())),
            (ValueKind::Int, Value::Text(t)) => {
                if t.trim().parse::<i64>().is_err() {
                    return Err(invalid(format!("'{t}' is not an integer")));
                }
                Value::Text(t.trim().to_string())
            }
            (ValueKind::Bool | ValueKind::Switch, Value::Text(t)) => {
                if parse_bool(&t).is_none() {
                    return Err(invalid(format!("'{t}' is not a boolean")));
                }
                self.canonical(Value::Text(t))
            }
            (ValueKind::Text, v) => v,
        };

        if !self.choices.is_empty() {
            for item in value.to_list() {
                if !self.choices.iter().any(|c| c.eq_ignore_ascii_case(&item)) {
                    return Err(Error::InvalidChoice {
                        path: path.to_string(),
                        option: self.name.to_string(),
                        value: item,
                        choices: self.choices.iter().map(ToString::to_string).collect(),
                    });
                }
            }
        }

        Ok(value)
    }

    /// Canonical form of a value read back from storage.
    pub fn canonical(&self, value: Value) -> Value {
        match (self.kind, value) {
            (ValueKind::List, v) => Value::List(v.to_list()),
            (ValueKind::Bool, Value::Text(t)) => match parse_bool(&t) {
                Some(b) => Value::Text(b.to_string()),
                None => Value::Text(t),
            },
            (ValueKind::Switch, Value::Text(t)) => match parse_bool(&t) {
                Some(true) => Value::text("on"),
                Some(false) => Value::text("off"),
                None => Value::Text(t),
            },
            (_, v) => v,
        }
    }

    /// Ordering weight: `name` and `state` first, then required options.
    pub fn weight(&self) -> (u8, char, char, &'static str) {
        let head = if matches!(self.name, "name" | "state") {
            'A'
        } else {
            'B'
        };
        let req = if self.required { 'C' } else { 'D' };
        (self.prio, head, req, self.name)
    }
}

impl<B: ?Sized + 'static> std::fmt::Debug for OptionSpec<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionSpec")
            .field("name", &self.name)
            .field("prio", &self.prio)
            .field("storage", &self.storage)
            .field("default", &self.default)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Order options by priority then weight.
pub fn by_weight<B: ?Sized + 'static>(a: &OptionSpec<B>, b: &OptionSpec<B>) -> Ordering {
    a.weight().cmp(&b.weight())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain;

    type Spec = OptionSpec<Plain>;

    static PORT: Spec = Spec::new("port", "listen port", &Plain)
        .stored("nsslapd-port", "cn=config")
        .kind(ValueKind::Int)
        .default("389");
    static STATE: Spec = Spec::new("state", "entity state", &Plain)
        .prio(2)
        .choices(&["present", "updated", "absent"]);
    static SUFFIX: Spec = Spec::new("suffix", "backend suffix", &Plain)
        .prio(5)
        .required()
        .readonly();
    static READONLY: Spec = Spec::new("readonly", "read only", &Plain).kind(ValueKind::Switch);
    static ROOTPW: Spec = Spec::new("rootpw", "password", &Plain).hidden();

    #[test]
    fn test_weight_orders_prio_then_name_state_then_required() {
        let mut specs = vec![&PORT, &SUFFIX, &STATE, &READONLY];
        specs.sort_by(|a, b| by_weight(*a, *b));
        let names: Vec<&str> = specs.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["state", "suffix", "port", "readonly"]);
    }

    #[test]
    fn test_differs_falls_back_to_default() {
        assert!(!PORT.differs(None, &Value::text("389")));
        assert!(PORT.differs(None, &Value::text("3389")));
        assert!(!PORT.differs(Some(&Value::text("3389")), &Value::text("3389")));
        assert!(SUFFIX.differs(None, &Value::text("dc=example,dc=com")));
    }

    #[test]
    fn test_check_int() {
        assert!(PORT.check("instance i1", Value::text("abc")).is_err());
        assert_eq!(
            PORT.check("instance i1", Value::text(" 636 ")).unwrap(),
            Value::text("636")
        );
    }

    #[test]
    fn test_check_choices() {
        let err = STATE.check("instance i1", Value::text("gone")).unwrap_err();
        assert!(matches!(err, Error::InvalidChoice { .. }));
        assert!(STATE.check("instance i1", Value::text("Absent")).is_ok());
    }

    #[test]
    fn test_switch_canonical() {
        assert_eq!(
            READONLY.check("b", Value::text("true")).unwrap(),
            Value::text("on")
        );
        assert_eq!(READONLY.canonical(Value::text("OFF")), Value::text("off"));
    }

    #[test]
    fn test_single_element_list_for_scalar() {
        assert_eq!(
            PORT.check("i", Value::List(vec!["389".into()])).unwrap(),
            Value::text("389")
        );
        assert!(PORT.check("i", Value::List(vec!["1".into(), "2".into()])).is_err());
    }

    #[test]
    fn test_hidden_display_masked() {
        assert_eq!(ROOTPW.display(Some(&Value::text("secret"))), "******");
        assert_eq!(PORT.display(Some(&Value::text("389"))), "389");
    }
}
