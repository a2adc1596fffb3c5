//! Public, owned representation of Language values.
//!
//! [`Object`] is the host-facing value type: it owns all its data, can be
//! freely cloned, serialised and stored, and needs no heap to operate on.
//! The internal `Value` type converts to and from it at the runtime
//! boundary.

use std::fmt::{self, Write};

use num_bigint::BigInt;

use crate::exceptions::ExcType;

/// A Language value that can be passed to or returned from the runtime.
///
/// # JSON serialisation
///
/// `Object` has a natural JSON mapping through [`Object::to_json`] /
/// [`Object::from_json`]:
///
/// - `None` ↔ `null`, `Bool` ↔ `true`/`false`, `Int` ↔ number,
///   `Float` ↔ number, `String` ↔ string, `List` ↔ array,
///   `Dict` ↔ object (string keys only)
/// - output-only: `Tuple` → array, `Bytes` → array of numbers,
///   `Exception` → `{"$exception": {...}}`, everything else → its repr
///   string
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Object {
    /// The `None` singleton.
    #[serde(alias = "none", alias = "NoneType")]
    None,
    /// The `Ellipsis` singleton (`...`).
    #[serde(alias = "ellipsis")]
    Ellipsis,
    /// The `NotImplemented` sentinel.
    NotImplemented,
    /// Boolean (`True` or `False`).
    #[serde(alias = "bool")]
    Bool(bool),
    /// Integer in the inline carrier range.
    #[serde(alias = "int")]
    Int(i64),
    /// Arbitrary-precision integer (the second integer carrier).
    BigInt(BigInt),
    /// 64-bit IEEE 754 float.
    #[serde(alias = "float")]
    Float(f64),
    /// UTF-8 string.
    #[serde(alias = "str")]
    String(String),
    /// Bytes object.
    #[serde(alias = "bytes")]
    Bytes(Vec<u8>),
    /// Mutable sequence.
    #[serde(alias = "list")]
    List(Vec<Self>),
    /// Immutable sequence.
    #[serde(alias = "tuple")]
    Tuple(Vec<Self>),
    /// Insertion-ordered mapping.
    #[serde(alias = "dict")]
    Dict(Vec<(Self, Self)>),
    /// An exception value with type and rendered message.
    Exception {
        exc_type: ExcType,
        message: Option<String>,
    },
    /// A type object, by canonical name.
    Type(String),
    /// Fallback for values with no direct `Object` mapping; contains the
    /// repr string of the original value. Output-only.
    Repr(String),
}

impl Object {
    /// Writes the Language `repr()` of this object.
    pub fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Ellipsis => f.write_str("Ellipsis"),
            Self::NotImplemented => f.write_str("NotImplemented"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::BigInt(b) => write!(f, "{b}"),
            Self::Float(v) => f.write_str(&crate::types::num::format_float(*v)),
            Self::String(s) => crate::types::str::string_repr_fmt(s, f),
            Self::Bytes(b) => crate::types::bytes::bytes_repr_fmt(b, f),
            Self::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.repr_fmt(f)?;
                }
                f.write_char(']')
            }
            Self::Tuple(items) => {
                f.write_char('(')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.repr_fmt(f)?;
                }
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::Dict(pairs) => {
                f.write_char('{')?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    k.repr_fmt(f)?;
                    f.write_str(": ")?;
                    v.repr_fmt(f)?;
                }
                f.write_char('}')
            }
            Self::Exception { exc_type, message } => match message {
                Some(msg) => {
                    write!(f, "{exc_type}(")?;
                    crate::types::str::string_repr_fmt(msg, f)?;
                    f.write_char(')')
                }
                None => write!(f, "{exc_type}()"),
            },
            Self::Type(name) => write!(f, "<class '{name}'>"),
            Self::Repr(text) => f.write_str(text),
        }
    }

    /// Returns the Language `repr()` as a new string.
    #[must_use]
    pub fn repr_string(&self) -> String {
        let mut out = String::new();
        self.repr_fmt(&mut out).expect("string write cannot fail");
        out
    }

    /// Converts this object to its natural JSON form.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Map, Value as Json, json};
        match self {
            Self::None => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => json!(i),
            Self::BigInt(b) => json!(b.to_string()),
            Self::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Self::String(s) => Json::String(s.clone()),
            Self::Bytes(b) => json!(b),
            Self::List(items) | Self::Tuple(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Dict(pairs) => {
                let mut map = Map::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let key = match k {
                        Self::String(s) => s.clone(),
                        other => other.repr_string(),
                    };
                    map.insert(key, v.to_json());
                }
                Json::Object(map)
            }
            Self::Exception { exc_type, message } => json!({
                "$exception": { "type": exc_type.to_string(), "message": message }
            }),
            other => Json::String(other.repr_string()),
        }
    }

    /// Builds an object from its natural JSON form.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::None,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Self::String(s.clone()),
            Json::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::Dict(
                map.iter()
                    .map(|(k, v)| (Self::String(k.clone()), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            _ => self.repr_fmt(f),
        }
    }
}

impl From<bool> for Object {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Object {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Object {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_reprs() {
        assert_eq!(Object::Bool(true).repr_string(), "True");
        assert_eq!(Object::Ellipsis.repr_string(), "Ellipsis");
        assert_eq!(Object::None.repr_string(), "None");
        assert_eq!(Object::NotImplemented.repr_string(), "NotImplemented");
    }

    #[test]
    fn container_reprs() {
        let obj = Object::List(vec![Object::Int(1), Object::String("a".into())]);
        assert_eq!(obj.repr_string(), "[1, 'a']");
        let tup = Object::Tuple(vec![Object::Int(1)]);
        assert_eq!(tup.repr_string(), "(1,)");
    }

    #[test]
    fn json_round_trip() {
        let obj = Object::Dict(vec![
            (Object::String("a".into()), Object::Int(1)),
            (Object::String("b".into()), Object::List(vec![Object::Bool(true)])),
        ]);
        let json = obj.to_json();
        assert_eq!(Object::from_json(&json), obj);
    }
}
