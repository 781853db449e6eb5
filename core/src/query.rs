//! Bracket-notation query encoder.
//!
//! # Design
//! Flattens a `serde_json::Value` of any depth into `key=value` pairs, the
//! shape nested-form parsers (PHP `$_POST`, Rack, `qs`) decode back into the
//! original structure. Child keys are appended as `[key]` / `[index]`
//! segments; at the top level the key or index is the whole name. Maps keep
//! insertion order (`serde_json` is built with `preserve_order`).
//!
//! Values are always percent-encoded with the `encodeURIComponent` set, so a
//! space becomes `%20`, never `+`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Escape set of `encodeURIComponent`: everything except
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const DEFAULT_SEPARATOR: &str = "&";

/// Percent-encode a single key or value component.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Encode `value` as bracket-notation pairs joined by `separator`.
///
/// `prefix` names the root; when empty, a scalar encodes to its value alone
/// and the first level of keys or indexes become plain names. With
/// `raw_keys`, key names are emitted verbatim (values are still encoded).
pub fn encode(value: &Value, prefix: &str, separator: &str, raw_keys: bool) -> String {
    let mut pairs = Vec::new();
    collect(value, prefix, raw_keys, &mut pairs);
    pairs.join(separator)
}

/// `encode` with an empty prefix, `&` separator and encoded keys; the form
/// used for `application/x-www-form-urlencoded` bodies.
pub fn encode_query(value: &Value) -> String {
    encode(value, "", DEFAULT_SEPARATOR, false)
}

/// Encode any serializable value by way of its JSON representation.
pub fn encode_serialize<S: Serialize>(
    value: &S,
    prefix: &str,
    separator: &str,
    raw_keys: bool,
) -> Result<String, Error> {
    let value = serde_json::to_value(value)?;
    Ok(encode(&value, prefix, separator, raw_keys))
}

fn collect(value: &Value, prefix: &str, raw_keys: bool, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect(item, &child_key(prefix, &index.to_string()), raw_keys, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect(item, &child_key(prefix, key), raw_keys, out);
            }
        }
        scalar => {
            let encoded = encode_component(&scalar_text(scalar));
            if prefix.is_empty() {
                out.push(encoded);
            } else if raw_keys {
                out.push(format!("{prefix}={encoded}"));
            } else {
                out.push(format!("{}={encoded}", encode_component(prefix)));
            }
        }
    }
}

fn child_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}[{key}]")
    }
}

/// Floats print the way script number-to-string does: `1.0` is `1`, and
/// negative zero is `0`.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => match n.as_f64().filter(|_| n.is_f64()) {
            Some(f) if f == 0.0 => "0".to_string(),
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}
