//! JSON Schema fragment constructors
//!
//! Compiler output nodes are plain `serde_json::Value`s; these helpers keep
//! their shape consistent across the metadata service and the field compiler.

use serde_json::{json, Map, Value};

/// Languages of a multi-language property, in output order
pub const LANGUAGES: [&str; 3] = ["fi", "sv", "en"];

pub fn string_schema() -> Value {
    json!({ "type": "string" })
}

pub fn boolean_schema() -> Value {
    json!({ "type": "boolean" })
}

pub fn integer_schema() -> Value {
    json!({ "type": "integer" })
}

/// Object schema with no declared properties
pub fn bare_object_schema() -> Value {
    json!({ "type": "object" })
}

/// Object schema over `properties`; `required` is omitted when empty
pub fn object_schema(properties: Map<String, Value>, required: Vec<String>) -> Value {
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    Value::Object(schema)
}

pub fn array_schema(items: Value) -> Value {
    json!({ "type": "array", "items": items })
}

/// Object with one string per language in [`LANGUAGES`]
pub fn multi_language_schema() -> Value {
    let properties = LANGUAGES
        .iter()
        .map(|lang| (lang.to_string(), string_schema()))
        .collect();
    json!({ "type": "object", "properties": Value::Object(properties) })
}

/// String enum with parallel `enum`/`enumNames` arrays
pub fn enum_schema(values: Vec<String>, names: Vec<String>) -> Value {
    json!({ "type": "string", "enum": values, "enumNames": names })
}

/// Set `key` on an object schema; non-objects are returned unchanged
pub fn with_key(mut schema: Value, key: &str, value: Value) -> Value {
    if let Value::Object(map) = &mut schema {
        map.insert(key.to_string(), value);
    }
    schema
}

/// Set or clear `title`
pub fn with_title(mut schema: Value, title: Option<String>) -> Value {
    if let Value::Object(map) = &mut schema {
        match title {
            Some(title) => {
                map.insert("title".to_string(), Value::String(title));
            }
            None => {
                map.remove("title");
            }
        }
    }
    schema
}

/// Apply `f` to the schema holding `enum`: the `items` of an array schema,
/// otherwise the schema itself
pub fn map_enum_holder(mut schema: Value, f: impl FnOnce(Value) -> Value) -> Value {
    let is_array = schema.get("type").and_then(Value::as_str) == Some("array");
    if let (true, Some(items)) = (is_array, schema.get_mut("items")) {
        *items = f(items.take());
        return schema;
    }
    f(schema)
}

/// Replace `enum`/`enumNames` with the entries of a value → label mapping
pub fn with_value_options(schema: Value, value_options: &Map<String, Value>) -> Value {
    let mut values = Vec::with_capacity(value_options.len());
    let mut names = Vec::with_capacity(value_options.len());
    for (value, label) in value_options {
        values.push(Value::String(value.clone()));
        names.push(label.clone());
    }
    let schema = with_key(schema, "enum", Value::Array(values));
    with_key(schema, "enumNames", Value::Array(names))
}

/// Narrow `enum`/`enumNames` to the whitelisted values, keeping the
/// original order. Whitelist entries missing from the enum are dropped.
/// A schema without an `enum` array is returned unchanged.
pub fn filter_whitelist(mut schema: Value, whitelist: &[Value]) -> Value {
    let Value::Object(map) = &mut schema else {
        return schema;
    };
    let Some(values) = map.get("enum").and_then(Value::as_array).cloned() else {
        tracing::warn!("whitelist on a schema without an enum, ignored");
        return schema;
    };
    let names = map.get("enumNames").and_then(Value::as_array).cloned();

    for wanted in whitelist {
        if !values.contains(wanted) {
            tracing::warn!(value = %wanted, "whitelisted value not present in enum");
        }
    }

    let mut kept_values = Vec::new();
    let mut kept_names = Vec::new();
    for (idx, value) in values.iter().enumerate() {
        if whitelist.contains(value) {
            kept_values.push(value.clone());
            if let Some(names) = &names {
                kept_names.push(names.get(idx).cloned().unwrap_or(Value::Null));
            }
        }
    }

    map.insert("enum".to_string(), Value::Array(kept_values));
    if names.is_some() {
        map.insert("enumNames".to_string(), Value::Array(kept_names));
    }
    schema
}
