//! Field Compiler
//!
//! Walks an expanded field tree against the metadata of each enclosing
//! class. Sibling fields compile concurrently; the first failure aborts the
//! whole group, so a parent schema is only ever assembled from complete
//! children.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use super::overrides::CompilerOverrides;
use crate::error::{CompileError, Result};
use crate::forms::{Field, FieldKind};
use crate::json::{translate_str, unprefix, TranslationMap};
use crate::metadata::{MetadataService, PropertyModel};
use crate::schema;

/// Field options with a meaning of their own, never copied into a leaf schema
const RESERVED_OPTIONS: [&str; 4] = ["whitelist", "value_options", "excludeFromCopy", "required"];

/// Compiled form of one field
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub key: String,
    pub schema: Value,
    pub required: bool,
    pub validators: Option<Value>,
    pub warnings: Option<Value>,
    /// Data paths of fields flagged `excludeFromCopy`, this one included
    pub exclude_from_copy: Vec<String>,
}

/// Compiled siblings, in field order
#[derive(Debug, Clone, Default)]
pub struct CompiledGroup {
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
    pub validators: Map<String, Value>,
    pub warnings: Map<String, Value>,
    pub exclude_from_copy: Vec<String>,
}

impl CompiledGroup {
    fn push(&mut self, field: CompiledField) {
        if field.required {
            self.required.push(field.key.clone());
        }
        if let Some(validators) = field.validators {
            self.validators.insert(field.key.clone(), validators);
        }
        if let Some(warnings) = field.warnings {
            self.warnings.insert(field.key.clone(), warnings);
        }
        self.exclude_from_copy.extend(field.exclude_from_copy);
        self.properties.insert(field.key, field.schema);
    }

    /// Object schema over the compiled siblings
    pub fn object_schema(&self) -> Value {
        schema::object_schema(self.properties.clone(), self.required.clone())
    }
}

/// Compiles field trees for one language
pub struct FieldCompiler<'a> {
    metadata: &'a MetadataService,
    overrides: &'a CompilerOverrides,
    translations: &'a TranslationMap,
    lang: &'a str,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> FieldCompiler<'a> {
    pub fn new(
        metadata: &'a MetadataService,
        overrides: &'a CompilerOverrides,
        translations: &'a TranslationMap,
        lang: &'a str,
        cancel: Option<&'a CancellationToken>,
    ) -> Self {
        Self { metadata, overrides, translations, lang, cancel }
    }

    /// Compile `fields` as the children of `class_ref`, rooted at data path `path`
    pub async fn compile_class(
        &self,
        class_ref: &str,
        fields: &[Field],
        path: &str,
    ) -> Result<CompiledGroup> {
        self.check_cancelled(class_ref)?;
        let class = self.metadata.resolve_class_name(class_ref);
        let properties = self.metadata.properties(class_ref, self.lang).await?;
        self.compile_group(fields, &properties, &class, path).await
    }

    async fn compile_group(
        &self,
        fields: &[Field],
        properties: &[PropertyModel],
        class: &str,
        path: &str,
    ) -> Result<CompiledGroup> {
        let compiled = try_join_all(
            fields
                .iter()
                .map(|field| self.compile_field(field, properties, class, path)),
        )
        .await?;

        let mut group = CompiledGroup::default();
        for field in compiled {
            group.push(field);
        }
        Ok(group)
    }

    fn compile_field<'s>(
        &'s self,
        field: &'s Field,
        properties: &'s [PropertyModel],
        class: &'s str,
        path: &'s str,
    ) -> BoxFuture<'s, Result<CompiledField>> {
        async move {
            let property = find_property(field, properties, class)?;
            let key = unprefix(&field.name).to_string();
            let field_path = format!("{}.{}", path, key);

            let (schema, validators, warnings, mut exclude_from_copy) = match field.kind() {
                FieldKind::Fieldset | FieldKind::Collection => {
                    let collection = field.kind() == FieldKind::Collection;
                    let child_path = if collection {
                        format!("{}[*]", field_path)
                    } else {
                        field_path.clone()
                    };
                    let group = self
                        .compile_class(&field.name, field.children(), &child_path)
                        .await?;

                    let mut schema = group.object_schema();
                    if collection {
                        schema = schema::array_schema(schema);
                    }
                    let validators = nest(field.validators.as_ref(), group.validators, collection);
                    let warnings = nest(field.warnings.as_ref(), group.warnings, collection);
                    (schema, validators, warnings, group.exclude_from_copy)
                }
                FieldKind::Leaf => {
                    let base = self.metadata.schema_for_property(property, self.lang).await?;
                    let schema = apply_leaf_options(base, field);
                    let validators = nest(field.validators.as_ref(), Map::new(), false);
                    let warnings = nest(field.warnings.as_ref(), Map::new(), false);
                    (schema, validators, warnings, Vec::new())
                }
            };

            let mut schema = schema::with_title(schema, self.resolve_title(field, property));
            if let Some(default) = field.option("default") {
                schema = schema::with_key(schema, "default", default.clone());
            }
            if field.flag("excludeFromCopy") {
                schema = schema::with_key(schema, "excludeFromCopy", json!(true));
                exclude_from_copy.insert(0, field_path);
            }

            let required = self
                .overrides
                .required_override(&property.property)
                .unwrap_or(property.required || field.flag("required"));

            Ok(CompiledField {
                key,
                schema,
                required,
                validators,
                warnings,
                exclude_from_copy,
            })
        }
        .boxed()
    }

    /// Override table, then the field's own label, then the metadata label
    fn resolve_title(&self, field: &Field, property: &PropertyModel) -> Option<String> {
        if self.overrides.is_untitled(&property.property) {
            return None;
        }
        match &field.label {
            Some(Value::String(label)) => Some(translate_str(label, self.translations)),
            Some(Value::Object(by_lang)) => by_lang
                .get(self.lang)
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| property.label.clone()),
            _ => property.label.clone(),
        }
    }

    /// Cancellation is honoured only where a fetch would happen
    fn check_cancelled(&self, class_ref: &str) -> Result<()> {
        let cancelled = self.cancel.is_some_and(CancellationToken::is_cancelled);
        if cancelled && !self.metadata.has_properties(class_ref, self.lang) {
            return Err(CompileError::Cancelled);
        }
        Ok(())
    }
}

fn find_property<'p>(
    field: &Field,
    properties: &'p [PropertyModel],
    class: &str,
) -> Result<&'p PropertyModel> {
    let wanted = unprefix(&field.name);
    properties
        .iter()
        .find(|p| p.unprefixed_name() == wanted)
        .ok_or_else(|| CompileError::UnknownField {
            field: field.name.clone(),
            class: class.to_string(),
            suggestion: suggest(wanted, properties),
        })
}

/// Closest property name to an unknown field, by fuzzy score
fn suggest(wanted: &str, properties: &[PropertyModel]) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    properties
        .iter()
        .filter_map(|p| {
            let name = p.unprefixed_name();
            matcher
                .fuzzy_match(name, wanted)
                .or_else(|| matcher.fuzzy_match(wanted, name))
                .map(|score| (score, name))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, name)| name.to_string())
}

/// `value_options` replaces the enum, `whitelist` narrows it (on `items` for
/// arrays), then the remaining literal options are merged in, last write wins
fn apply_leaf_options(mut schema: Value, field: &Field) -> Value {
    if let Some(Value::Object(value_options)) = field.option("value_options") {
        schema = schema::map_enum_holder(schema, |s| schema::with_value_options(s, value_options));
    }
    if let Some(Value::Array(whitelist)) = field.option("whitelist") {
        schema = schema::map_enum_holder(schema, |s| schema::filter_whitelist(s, whitelist));
    }
    if let Some(options) = &field.options {
        for (key, value) in options {
            if !RESERVED_OPTIONS.contains(&key.as_str()) {
                schema = schema::with_key(schema, key, value.clone());
            }
        }
    }
    schema
}

/// Field-level validators/warnings combined with those of its children.
///
/// Children sit under `properties`, or `items.properties` for collections.
fn nest(own: Option<&Value>, children: Map<String, Value>, collection: bool) -> Option<Value> {
    let mut combined = match own {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    if !children.is_empty() {
        let children = Value::Object(children);
        if collection {
            combined.insert("items".to_string(), json!({ "properties": children }));
        } else {
            combined.insert("properties".to_string(), children);
        }
    }
    if combined.is_empty() {
        None
    } else {
        Some(Value::Object(combined))
    }
}
