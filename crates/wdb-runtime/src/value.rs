use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::ObjectId;

/// Name → value mapping for one scope (globals or locals of a frame).
pub type Bindings = BTreeMap<String, Value>;

/// A value living in the debugged program, as seen by the engine.
///
/// Scalars and containers are carried by value. Anything else is an opaque
/// [`ObjectRef`] whose identity is owned by the runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Object(ObjectRef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub type_name: String,
    pub repr: String,
    /// Human string form when it differs from `repr`.
    pub text: Option<String>,
    pub doc: Option<String>,
    pub source: Option<String>,
    pub attributes: Vec<(String, Value)>,
}

impl ObjectRef {
    pub fn new(id: ObjectId, type_name: impl Into<String>, repr: impl Into<String>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            repr: repr.into(),
            text: None,
            doc: None,
            source: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.push((name.into(), value));
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Runtime identity, only meaningful for reference objects.
    pub fn identity(&self) -> Option<ObjectId> {
        match self {
            Self::Object(obj) => Some(obj.id),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Object(obj) => &obj.type_name,
        }
    }

    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    /// Human string form (`str()` rather than `repr()`).
    pub fn text(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Object(obj) => obj.text.clone().unwrap_or_else(|| obj.repr.clone()),
            other => other.repr(),
        }
    }

    /// Byte form used by `display`: bytes as-is, everything else via its text.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.clone(),
            other => other.text().into_bytes(),
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            Self::Object(obj) => obj.doc.as_deref(),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Object(obj) => obj.source.as_deref(),
            _ => None,
        }
    }

    /// Attribute-level view used by deep dumps.
    pub fn attributes(&self) -> Vec<(String, Value)> {
        match self {
            Self::Object(obj) => obj.attributes.clone(),
            Self::List(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| (idx.to_string(), item.clone()))
                .collect(),
            Self::Dict(entries) => entries
                .iter()
                .map(|(key, value)| (key.repr(), value.clone()))
                .collect(),
            other => vec![("__class__".to_string(), Value::str(other.type_name()))],
        }
    }

    fn write_repr(&self, out: &mut String) {
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Self::Float(v) => out.push_str(&float_repr(*v)),
            Self::Str(s) => out.push_str(&str_repr(s)),
            Self::Bytes(bytes) => out.push_str(&bytes_repr(bytes)),
            Self::List(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out);
                }
                out.push(']');
            }
            Self::Dict(entries) => {
                out.push('{');
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out);
                    out.push_str(": ");
                    value.write_repr(out);
                }
                out.push('}');
            }
            Self::Object(obj) => out.push_str(&obj.repr),
        }
    }
}

fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let formatted = format!("{v:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push_str("b'");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push('\'');
    out
}

/// JSON shape of a value. Anything without a native JSON form serializes as
/// its repr, so encoding a value never fails.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Dict(entries) if entries.iter().all(|(k, _)| matches!(k, Self::Str(_))) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    if let Self::Str(key) = key {
                        map.serialize_entry(key, value)?;
                    }
                }
                map.end()
            }
            Self::Str(s) => serializer.serialize_str(s),
            other => serializer.serialize_str(&other.repr()),
        }
    }
}
