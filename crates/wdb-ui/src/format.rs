//! HTML-ish rendering of runtime values for the front-end.

use std::collections::BTreeMap;

use wdb_runtime::{CapturedException, Value};

use crate::object_cache::{ObjectCache, ObjectHandle};

const NBSP: char = '\u{a0}';

/// Escapes `&`, `<` and `>`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub fn inspect_link(handle: ObjectHandle, label: &str) -> String {
    format!("<a href=\"{handle}\" class=\"inspect\">{label}</a>")
}

/// Repr of `value`; reference objects become inspect links backed by `cache`.
pub fn safe_repr(value: &Value, cache: &ObjectCache) -> String {
    match value {
        Value::Object(obj) => {
            let handle = cache.track_value(value);
            inspect_link(handle, &escape(&obj.repr))
        }
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(|item| safe_repr(item, cache)).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Dict(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", safe_repr(key, cache), safe_repr(value, cache)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        other => escape(&other.repr()),
    }
}

/// Registers `exception` and returns its inline reference.
pub fn exception_link(exception: &CapturedException, cache: &ObjectCache) -> String {
    let label = format!(
        "{}: {}",
        escape(&exception.type_name),
        escape(&exception.message)
    );
    let handle = cache.track_exception(exception.clone());
    inspect_link(handle, &label)
}

/// Attribute name → rendered value, the deep view behind `Dump`.
pub fn dump_value(value: &Value, cache: &ObjectCache) -> BTreeMap<String, String> {
    value
        .attributes()
        .into_iter()
        .map(|(name, attr)| (name, safe_repr(&attr, cache)))
        .collect()
}

/// Exceptions are dumped like objects with their parts as attributes.
pub fn dump_exception(exception: &CapturedException) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("__class__".to_string(), escape(&exception.type_name)),
        ("args".to_string(), escape(&exception.message)),
        ("traceback".to_string(), escape(&exception.formatted)),
    ])
}

/// Echo of user input: spaces kept, continuation lines indented under the
/// prompt.
pub fn display_input(input: &str) -> String {
    let continuation: String = std::iter::once('\n')
        .chain(std::iter::repeat(NBSP).take(4))
        .collect();
    input.replace(' ', "\u{a0}").replace('\n', &continuation)
}
