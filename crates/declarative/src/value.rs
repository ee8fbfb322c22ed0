//! Option values.
//!
//! Values are kept as text so they can be compared with what a system stores.
//! Scalars of any type deserialize to [`Value::Text`], sequences to
//! [`Value::List`].

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single- or multi-valued option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    List(Vec<String>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// The values as a list, a text value being a one-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::Text(v) => vec![v.clone()],
            Self::List(v) => v.clone(),
        }
    }

    /// The first value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            Self::List(v) => v.first().map(String::as_str),
        }
    }

    /// Whether two values are equal ignoring case, lists compared as sets.
    pub fn matches(&self, other: &Self) -> bool {
        let fold = |v: &Self| -> BTreeSet<String> {
            v.to_list().iter().map(|s| s.trim().to_lowercase()).collect()
        };
        fold(self) == fold(other)
    }

    /// Boolean reading of the value (`on`, `true`, `yes`, `1`).
    pub fn is_true(&self) -> bool {
        self.first()
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "on" | "true" | "yes" | "1"))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => f.write_str(v),
            Self::List(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number, boolean or list of those")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut values = Vec::new();
        while let Some(item) = seq.next_element::<Value>()? {
            match item {
                Value::Text(v) => values.push(v),
                Value::List(_) => return Err(de::Error::custom("nested lists are not supported")),
            }
        }
        Ok(Value::List(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_become_text() {
        let v: Value = serde_json::from_str("389").unwrap();
        assert_eq!(v, Value::text("389"));
        let v: Value = serde_json::from_str("true").unwrap();
        assert_eq!(v, Value::text("true"));
    }

    #[test]
    fn test_sequence_becomes_list() {
        let v: Value = serde_json::from_str(r#"["eq", "pres"]"#).unwrap();
        assert_eq!(v, Value::List(vec!["eq".into(), "pres".into()]));
    }

    #[test]
    fn test_matches_ignores_case_and_order() {
        let a = Value::List(vec!["EQ".into(), "pres".into()]);
        let b = Value::List(vec!["pres".into(), "eq".into()]);
        assert!(a.matches(&b));
        assert!(Value::text("On").matches(&Value::text("on")));
        assert!(!Value::text("on").matches(&Value::text("off")));
        assert!(Value::text("x").matches(&Value::List(vec!["X".into()])));
    }

    #[test]
    fn test_is_true() {
        assert!(Value::text("ON").is_true());
        assert!(Value::text("yes").is_true());
        assert!(!Value::text("off").is_true());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::List(vec!["a".into(), "b".into()]).to_string(), "[a, b]");
    }
}
