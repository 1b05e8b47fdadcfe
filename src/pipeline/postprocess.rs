//! Post-processing: turn raw model text into a [`NormalizedResult`].
//!
//! ## Why is post-processing necessary?
//!
//! Even when told to return raw JSON, models routinely wrap their answer in a
//! ` ```json ... ``` ` fence, and they echo the human-readable field labels
//! from the prompt as keys (`"First Name"`, `"Program Start Date"`). API
//! consumers want a stable camelCase contract instead.
//!
//! ## Rules (applied in order)
//!
//! 1. Remove every ` ```json ` marker and a trailing ` ``` ` marker
//! 2. Trim surrounding whitespace
//! 3. Parse as JSON; on success rewrite every mapping key to camelCase, at
//!    every depth
//! 4. On parse failure return the cleaned text as-is
//!
//! [`normalize`] never fails. It is also idempotent: feeding the serialised
//! output back in yields the same result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// The external result contract: a JSON value with camelCase keys, or plain
/// text when the model did not answer with JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedResult {
    Json(Value),
    Text(String),
}

impl NormalizedResult {
    pub fn is_json(&self) -> bool {
        matches!(self, NormalizedResult::Json(_))
    }

    /// The result as a JSON value (`Text` becomes a JSON string).
    pub fn into_value(self) -> Value {
        match self {
            NormalizedResult::Json(v) => v,
            NormalizedResult::Text(s) => Value::String(s),
        }
    }

    /// Pretty rendering: 2-space indented JSON, or the text unchanged.
    pub fn to_pretty_string(&self) -> String {
        match self {
            NormalizedResult::Json(v) => {
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            }
            NormalizedResult::Text(s) => s.clone(),
        }
    }
}

/// Normalise raw model output. See the module docs for the rules.
pub fn normalize(raw: &str) -> NormalizedResult {
    let cleaned = strip_json_fences(raw);
    let cleaned = cleaned.trim();

    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => NormalizedResult::Json(camel_case_keys(value)),
        Err(_) => NormalizedResult::Text(cleaned.to_string()),
    }
}

// ── Rule 1: Strip fence markers ──────────────────────────────────────────────

static RE_OPEN_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```json\s*").unwrap());
static RE_CLOSE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*$").unwrap());

fn strip_json_fences(input: &str) -> String {
    let s = RE_OPEN_FENCE.replace_all(input, "");
    RE_CLOSE_FENCE.replace(&s, "").into_owned()
}

// ── Rule 3: camelCase keys ───────────────────────────────────────────────────

/// Recursively rewrite every mapping key with [`to_camel_case`].
///
/// Sequence order is preserved. When two keys collapse to the same camelCase
/// form the later one wins.
pub fn camel_case_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                out.insert(to_camel_case(&key), camel_case_keys(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(camel_case_keys).collect()),
        other => other,
    }
}

/// Convert a label such as `"Program Start Date"` to `"programStartDate"`.
///
/// The key is split on whitespace. The first word is lowercased unless it
/// already starts with a non-uppercase character (so `"firstName"` and `"id"`
/// are fixed points). Each later word gets an uppercase first letter with the
/// rest left as-is. Keys with no words (`""`, `"  "`) are returned unchanged.
pub fn to_camel_case(key: &str) -> String {
    let mut words = key.split_whitespace();
    let Some(first) = words.next() else {
        return key.to_string();
    };

    let mut out = String::with_capacity(key.len());
    if first.chars().next().is_some_and(char::is_uppercase) {
        out.push_str(&first.to_lowercase());
    } else {
        out.push_str(first);
    }

    for word in words {
        let mut chars = word.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────
