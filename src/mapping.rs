//! Placeholder → value mappings and the boundary that validates them.
//!
//! The mapping model is asked for a flat JSON object keyed by placeholder
//! name. What comes back is treated as untrusted: [`parse_mapping_response`]
//! strips fences, normalises keys, coerces values to strings and guarantees
//! that every placeholder of the template has an entry.

use crate::error::DocFillError;
use crate::output::PageText;
use crate::pipeline::postprocess::strip_code_fences;
use crate::template::Delimiters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// Replacement text per placeholder name. Names are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping(BTreeMap<String, String>);

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Entries whose value is not blank.
    pub fn filled_count(&self) -> usize {
        self.0.values().filter(|v| !v.trim().is_empty()).count()
    }

    /// Re-key against a template's placeholders with the rules
    /// [`parse_mapping_response`] applies to model answers.
    pub fn conform_to(self, placeholders: &BTreeSet<String>, delims: &Delimiters) -> Mapping {
        conform(self.0, placeholders, delims)
    }

    /// Load a caller-supplied mapping from a JSON file.
    ///
    /// The same value coercion as for model responses applies. Keys are kept
    /// as written until [`Mapping::conform_to`] matches them to a template.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DocFillError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DocFillError::InvalidConfig(format!("cannot read mapping file {}: {e}", path.display()))
        })?;
        let object = parse_object(&text)?;
        Ok(object
            .into_iter()
            .map(|(k, v)| (k, coerce_value(&v).unwrap_or_default()))
            .collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Mapping {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Join page texts into the corpus sent to the mapping call.
///
/// Each non-empty page is prefixed with a `--- Page N ---` marker; pages are
/// separated by a blank line.
pub fn build_corpus(pages: &[PageText]) -> String {
    pages
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| format!("--- Page {} ---\n{}", p.page_num, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Validate a mapping response against the template's placeholder set.
///
/// * Code fences are removed; if the text still is not JSON, the outermost
///   `{ … }` slice is tried before giving up.
/// * Keys are trimmed and stray delimiters removed, then matched exactly.
///   Unknown keys are dropped. An exact key wins over a normalised one.
/// * Strings are kept, numbers and booleans stringified, anything else
///   becomes an empty string.
/// * Every placeholder is present in the result; missing ones map to "".
pub fn parse_mapping_response(
    response: &str,
    placeholders: &BTreeSet<String>,
    delims: &Delimiters,
) -> Result<Mapping, DocFillError> {
    let object = parse_object(response)?;
    let entries = object.into_iter().map(|(key, value)| {
        let text = coerce_value(&value).unwrap_or_else(|| {
            warn!("Mapping value for {key} is not a scalar; using empty string");
            String::new()
        });
        (key, text)
    });
    Ok(conform(entries, placeholders, delims))
}

/// Match raw keys against the placeholder set: exact keys first, then
/// normalised ones; unknown keys are dropped and missing names map to "".
fn conform(
    entries: impl IntoIterator<Item = (String, String)>,
    placeholders: &BTreeSet<String>,
    delims: &Delimiters,
) -> Mapping {
    let mut mapping = Mapping::new();
    let mut exact: BTreeSet<String> = BTreeSet::new();

    for (raw_key, text) in entries {
        let is_exact = placeholders.contains(&raw_key);
        let key = if is_exact {
            raw_key.clone()
        } else {
            normalise_key(&raw_key, delims)
        };

        if !placeholders.contains(&key) {
            warn!("Dropping mapping key {raw_key:?}: not a placeholder of this template");
            continue;
        }
        if exact.contains(&key) {
            continue;
        }

        mapping.insert(key.clone(), text);
        if is_exact {
            exact.insert(key);
        }
    }

    for name in placeholders {
        if mapping.get(name).is_none() {
            debug!("No value given for {name}");
            mapping.insert(name.clone(), "");
        }
    }

    mapping
}

fn parse_object(response: &str) -> Result<serde_json::Map<String, Value>, DocFillError> {
    let cleaned = strip_code_fences(response);
    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(v) => v,
        Err(first_err) => outermost_object(&cleaned)
            .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
            .ok_or_else(|| DocFillError::MalformedMapping {
                detail: first_err.to_string(),
                response: truncate(response, 500),
            })?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(DocFillError::MalformedMapping {
            detail: format!("expected a JSON object, got {}", json_kind(&other)),
            response: truncate(response, 500),
        }),
    }
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn normalise_key(key: &str, delims: &Delimiters) -> String {
    let mut k = key.trim();
    if let Some(rest) = k.strip_prefix(delims.open.as_str()) {
        k = rest;
    }
    if let Some(rest) = k.strip_suffix(delims.close.as_str()) {
        k = rest;
    }
    k.trim().to_string()
}

fn coerce_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
