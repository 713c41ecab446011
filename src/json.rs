//! Structural JSON transforms shared by the expander and the compiler
//!
//! - `translate`: resolves `@`-prefixed placeholder strings against a flat
//!   key → text map
//! - `deep_merge`: right-biased recursive merge of two objects
//! - `unprefix`: strips the class prefix from a dotted property id

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Sigil marking a string as a translation placeholder
pub const TRANSLATION_SIGIL: char = '@';

/// Flat key → text map for one language
pub type TranslationMap = BTreeMap<String, String>;

/// Replace every `@`-prefixed string in `value` with its translation.
///
/// Lookup tries the exact key first, then the key without the sigil. A
/// placeholder with no entry under either key is left as is. Objects and
/// arrays are rebuilt with the same keys and order.
pub fn translate(value: &Value, translations: &TranslationMap) -> Value {
    match value {
        Value::String(s) => Value::String(translate_str(s, translations)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| translate(v, translations)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), translate(v, translations)))
                .collect(),
        ),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}

/// Translate a single string, see [`translate`]
pub fn translate_str(s: &str, translations: &TranslationMap) -> String {
    let Some(bare) = s.strip_prefix(TRANSLATION_SIGIL) else {
        return s.to_string();
    };
    if let Some(text) = translations.get(s) {
        return text.clone();
    }
    if let Some(text) = translations.get(bare) {
        return text.clone();
    }
    tracing::trace!(key = s, "no translation, keeping placeholder");
    s.to_string()
}

/// Merge `child` over `parent`.
///
/// When both sides are objects the merge recurses key by key, so a child
/// key overrides the parent only at the leaf where they differ. Any other
/// combination (scalars, arrays, type mismatch) takes the child value.
/// Parent keys keep their position; keys new in the child are appended.
pub fn deep_merge(parent: &Value, child: &Value) -> Value {
    match (parent, child) {
        (Value::Object(p), Value::Object(c)) => Value::Object(merge_maps(p, c)),
        (_, c) => c.clone(),
    }
}

fn merge_maps(parent: &Map<String, Value>, child: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::with_capacity(parent.len() + child.len());
    for (key, pv) in parent {
        let value = match child.get(key) {
            Some(cv) => deep_merge(pv, cv),
            None => pv.clone(),
        };
        merged.insert(key.clone(), value);
    }
    for (key, cv) in child {
        if !parent.contains_key(key) {
            merged.insert(key.clone(), cv.clone());
        }
    }
    merged
}

/// `MY.gatherings` → `gatherings`; ids without a prefix pass through
pub fn unprefix(id: &str) -> &str {
    match id.rfind('.') {
        Some(idx) => &id[idx + 1..],
        None => id,
    }
}
