//! Metadata Service
//!
//! Resolves class property lists and enumerated ranges through the
//! [`MetadataCache`], and maps one [`PropertyModel`] to its base JSON Schema.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::model::{PropertyModel, RangeEntry, RangeKind};
use super::transport::MetadataTransport;
use crate::cache::{MetadataCache, Memoized};
use crate::error::MetadataError;
use crate::schema;

/// Bare class names that differ from the property naming them
pub const CLASS_ALIASES: &[(&str, &str)] = &[
    ("gatherings", "gathering"),
    ("units", "unit"),
    ("identifications", "identification"),
    ("typeSpecimens", "typeSpecimen"),
    ("unitFact", "unitFactClass"),
    ("unitGathering", "unitGatheringClass"),
    ("gatheringFact", "gatheringFactClass"),
    ("documentFact", "documentFactClass"),
    ("taxonCensus", "taxonCensusClass"),
];

/// Properties holding a whole document to prefill from; emitted as bare objects
pub const PREPOPULATED_DOCUMENT_PROPERTIES: &[&str] = &["MHL.prepopulatedDocument"];

/// Geometry properties, structured even when not marked embeddable
pub const GEOMETRY_PROPERTIES: &[&str] = &["MY.geometry", "MY.wgs84Geometry"];

/// Cache key: labels and range values depend on the language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    pub lang: String,
    pub id: String,
}

impl MetadataKey {
    fn new(lang: &str, id: impl Into<String>) -> Self {
        Self { lang: lang.to_string(), id: id.into() }
    }
}

pub type PropertyList = Arc<Vec<PropertyModel>>;
pub type RangeList = Arc<Vec<RangeEntry>>;
pub type RangeMap = Arc<HashMap<String, Vec<RangeEntry>>>;

/// Metadata lookups and property → schema mapping
pub struct MetadataService {
    default_prefix: String,
    properties: Arc<Memoized<MetadataKey, PropertyList>>,
    ranges: Arc<Memoized<MetadataKey, RangeList>>,
    all_ranges: Arc<Memoized<String, RangeMap>>,
}

impl MetadataService {
    /// Create a service whose lookups are memoized in `cache`.
    ///
    /// `default_prefix` (e.g. `MY.`) qualifies bare class references.
    pub fn new(
        transport: Arc<dyn MetadataTransport>,
        cache: &MetadataCache,
        default_prefix: impl Into<String>,
    ) -> Self {
        let t = transport.clone();
        let properties = cache.memoize("properties", move |key: MetadataKey| {
            let transport = t.clone();
            async move {
                let body = transport.class_properties(&key.id, &key.lang).await?;
                parse_properties(&key.id, body).map(Arc::new)
            }
        });

        let t = transport.clone();
        let ranges = cache.memoize("ranges", move |key: MetadataKey| {
            let transport = t.clone();
            async move {
                let body = transport.range(&key.id, &key.lang).await?;
                parse_range(&key.id, body).map(Arc::new)
            }
        });

        let t = transport;
        let all_ranges = cache.memoize("all_ranges", move |lang: String| {
            let transport = t.clone();
            async move {
                let body = transport.all_ranges(&lang).await?;
                parse_all_ranges(body).map(Arc::new)
            }
        });

        Self {
            default_prefix: default_prefix.into(),
            properties,
            ranges,
            all_ranges,
        }
    }

    /// Canonical, prefixed class name for a property reference or class id.
    ///
    /// `gatherings` and `MY.gatherings` both resolve to `MY.gathering`.
    pub fn resolve_class_name(&self, reference: &str) -> String {
        let (prefix, local) = match reference.rfind('.') {
            Some(idx) => (&reference[..=idx], &reference[idx + 1..]),
            None => (self.default_prefix.as_str(), reference),
        };
        let canonical = CLASS_ALIASES
            .iter()
            .find(|(alias, _)| *alias == local)
            .map(|(_, class)| *class)
            .unwrap_or(local);
        format!("{}{}", prefix, canonical)
    }

    /// Ordered property list of a class, cached under the resolved class name
    pub async fn properties(
        &self,
        class_ref: &str,
        lang: &str,
    ) -> Result<PropertyList, MetadataError> {
        let class = self.resolve_class_name(class_ref);
        self.properties.get(MetadataKey::new(lang, class)).await
    }

    /// Whether the property list of `class_ref` is already cached
    pub fn has_properties(&self, class_ref: &str, lang: &str) -> bool {
        let class = self.resolve_class_name(class_ref);
        self.properties.contains(&MetadataKey::new(lang, class))
    }

    /// Values of one enumerated range.
    ///
    /// Served from the bulk range map when it has already been fetched.
    pub async fn range(&self, range_id: &str, lang: &str) -> Result<RangeList, MetadataError> {
        if let Some(Ok(all)) = self.all_ranges.peek(&lang.to_string()) {
            if let Some(entries) = all.get(range_id) {
                return Ok(Arc::new(entries.clone()));
            }
        }
        self.ranges.get(MetadataKey::new(lang, range_id)).await
    }

    /// Whether `range_id` is an enumerated range
    pub async fn is_alt_range(&self, range_id: &str, lang: &str) -> Result<bool, MetadataError> {
        let all = self.all_ranges.get(lang.to_string()).await?;
        Ok(all.contains_key(range_id))
    }

    /// Base JSON Schema for one property.
    ///
    /// Enumerated ranges win, then multi-language strings, then primitive
    /// range kinds, then the structural cases. The result is wrapped in an
    /// array for unbounded properties and titled with the property label.
    pub fn schema_for_property<'a>(
        &'a self,
        property: &'a PropertyModel,
        lang: &'a str,
    ) -> BoxFuture<'a, Result<Value, MetadataError>> {
        async move {
            let range = property.primary_range().unwrap_or_default();
            let enumerated = !range.is_empty() && self.is_alt_range(range, lang).await?;

            let base = if enumerated {
                self.enum_schema(property, range, lang).await?
            } else {
                self.structural_schema(property, range, lang).await?
            };

            let mut schema = base;
            if property.is_unbounded() {
                schema = schema::array_schema(schema);
                if enumerated {
                    schema = schema::with_key(schema, "uniqueItems", json!(true));
                }
            }
            Ok(schema::with_title(schema, property.label.clone()))
        }
        .boxed()
    }

    async fn enum_schema(
        &self,
        property: &PropertyModel,
        range: &str,
        lang: &str,
    ) -> Result<Value, MetadataError> {
        let entries = self.range(range, lang).await?;
        let mut values = Vec::with_capacity(entries.len() + 1);
        let mut names = Vec::with_capacity(entries.len() + 1);
        if !property.is_mandatory() {
            values.push(String::new());
            names.push(String::new());
        }
        for entry in entries.iter() {
            values.push(entry.id.clone());
            names.push(entry.value.clone());
        }
        Ok(schema::enum_schema(values, names))
    }

    async fn structural_schema(
        &self,
        property: &PropertyModel,
        range: &str,
        lang: &str,
    ) -> Result<Value, MetadataError> {
        if property.multi_language {
            return Ok(schema::multi_language_schema());
        }

        match RangeKind::classify(range) {
            RangeKind::String => Ok(schema::string_schema()),
            RangeKind::Boolean => Ok(schema::boolean_schema()),
            RangeKind::Integer => Ok(schema::integer_schema()),
            RangeKind::NonNegativeInteger => {
                Ok(schema::with_key(schema::integer_schema(), "minimum", json!(0)))
            }
            RangeKind::PositiveInteger => {
                Ok(schema::with_key(schema::integer_schema(), "exclusiveMinimum", json!(0)))
            }
            RangeKind::KeyValue | RangeKind::KeyAny => Ok(schema::bare_object_schema()),
            RangeKind::Other => {
                let id = property.property.as_str();
                if PREPOPULATED_DOCUMENT_PROPERTIES.contains(&id) {
                    Ok(schema::bare_object_schema())
                } else if !property.is_embeddable && !GEOMETRY_PROPERTIES.contains(&id) {
                    Ok(schema::string_schema())
                } else {
                    self.embedded_schema(range, lang).await
                }
            }
        }
    }

    async fn embedded_schema(&self, range: &str, lang: &str) -> Result<Value, MetadataError> {
        let children = self.properties(range, lang).await?;
        let schemas = try_join_all(
            children
                .iter()
                .map(|child| self.schema_for_property(child, lang)),
        )
        .await?;

        let properties: Map<String, Value> = children
            .iter()
            .zip(schemas)
            .map(|(child, schema)| (child.unprefixed_name().to_string(), schema))
            .collect();
        Ok(schema::object_schema(properties, Vec::new()))
    }
}

fn parse_properties(class: &str, body: Value) -> Result<Vec<PropertyModel>, MetadataError> {
    let results = match body {
        Value::Object(mut map) => map.remove("results"),
        _ => None,
    };
    let Some(results @ Value::Array(_)) = results else {
        return Err(MetadataError::Unavailable(format!(
            "properties of {} returned no results collection",
            class
        )));
    };
    serde_json::from_value(results).map_err(|e| {
        MetadataError::Unavailable(format!("malformed properties of {}: {}", class, e))
    })
}

fn parse_range(range_id: &str, body: Value) -> Result<Vec<RangeEntry>, MetadataError> {
    serde_json::from_value(body)
        .map_err(|e| MetadataError::Unavailable(format!("malformed range {}: {}", range_id, e)))
}

fn parse_all_ranges(body: Value) -> Result<HashMap<String, Vec<RangeEntry>>, MetadataError> {
    serde_json::from_value(body)
        .map_err(|e| MetadataError::Unavailable(format!("malformed range map: {}", e)))
}
