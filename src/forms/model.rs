//! Master and Field types
//!
//! Known keys are typed; everything else a Master or Field carries is kept
//! verbatim in `extra` so expansion and compilation never drop data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CompileError, Result};
use crate::json::TranslationMap;

/// Authored form definition, as stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Master {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, rename = "baseFormID", skip_serializing_if = "Option::is_none")]
    pub base_form_id: Option<String>,
    #[serde(default, rename = "fieldsFormID", skip_serializing_if = "Option::is_none")]
    pub fields_form_id: Option<String>,
    /// JSON-Patch operations, validated when applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Master {
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Structural role of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Fieldset,
    Collection,
    Leaf,
}

/// One node of the authored field tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Domain property id, e.g. `MY.gatherings`
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validators: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        match self.field_type.as_deref() {
            Some("fieldset") => FieldKind::Fieldset,
            Some("collection") => FieldKind::Collection,
            _ => FieldKind::Leaf,
        }
    }

    pub fn children(&self) -> &[Field] {
        self.fields.as_deref().unwrap_or_default()
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.as_ref().and_then(|o| o.get(key))
    }

    /// `options.<key>` is literally `true`
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.option(key), Some(Value::Bool(true)))
    }
}

/// Master with inheritance, field inclusion and patches resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedMaster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<Map<String, Value>>,
    pub ui_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys an ExpandedMaster must never carry
pub const UNRESOLVED_KEYS: [&str; 3] = ["baseFormID", "fieldsFormID", "patch"];

impl ExpandedMaster {
    /// Build from a fully resolved document
    pub fn from_document(document: Map<String, Value>) -> Result<Self> {
        if let Some(key) = UNRESOLVED_KEYS.iter().find(|k| document.contains_key(**k)) {
            return Err(CompileError::InvalidMaster(format!("unresolved key '{}'", key)));
        }
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    pub fn fields(&self) -> &[Field] {
        self.fields.as_deref().unwrap_or_default()
    }

    /// Flat key → text map for `lang`.
    ///
    /// Accepts `{lang: {key: text}}` blocks as well as `{key: {lang: text}}`
    /// entries; a per-language block wins over a per-key entry.
    pub fn translations_for(&self, lang: &str) -> TranslationMap {
        let mut flat = TranslationMap::new();
        let Some(translations) = &self.translations else {
            return flat;
        };
        for (key, value) in translations {
            if key == lang {
                continue;
            }
            if let Some(Value::String(text)) = value.get(lang) {
                flat.insert(key.clone(), text.clone());
            }
        }
        if let Some(Value::Object(block)) = translations.get(lang) {
            for (key, value) in block {
                if let Value::String(text) = value {
                    flat.insert(key.clone(), text.clone());
                }
            }
        }
        flat
    }
}
