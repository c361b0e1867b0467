//! `{{name}}` placeholder substitution
//!
//! Substitution is a single pass over each string: text inserted by a
//! replacement is never scanned again, so a value that itself contains a
//! placeholder (`a = "{{b}}"`) comes out with `{{b}}` left in place. Chained
//! references are not resolved.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Flat variable mapping, name -> value
pub type Variables = BTreeMap<String, String>;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replace every known `{{name}}` in a string
///
/// Unknown placeholders are kept verbatim.
pub fn substitute_str(input: &str, vars: &Variables) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        let name = &after_open[..end];
        out.push_str(&rest[..start]);
        match vars.get(name) {
            Some(value) => {
                out.push_str(value);
                rest = &after_open[end + CLOSE.len()..];
            }
            None => {
                // Step over one brace only so `{{{known}}}` still matches.
                out.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Substitute variables in every string nested inside a JSON value
///
/// Object keys and non-string scalars are left untouched.
pub fn substitute(value: &Value, vars: &Variables) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, vars)).collect()),
        Value::Object(map) => Value::Object(substitute_map(map, vars)),
        other => other.clone(),
    }
}

/// Substitute variables in the values of a JSON object
pub fn substitute_map(map: &Map<String, Value>, vars: &Variables) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), substitute(v, vars)))
        .collect()
}

/// Parse `key=value` pairs from the command line
pub fn parse_assignment(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", input)),
    }
}
