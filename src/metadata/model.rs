//! Domain metadata types

use serde::{Deserialize, Serialize};

use crate::json::unprefix;

/// `maxOccurs` value marking an array-valued property
pub const UNBOUNDED: &str = "unbounded";

/// Metadata descriptor of one property of a domain class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyModel {
    /// Fully qualified id, e.g. `MY.locality`
    pub property: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Ordered type identifiers; the first one is the primary range
    #[serde(default)]
    pub range: Vec<String>,
    #[serde(default = "default_min_occurs")]
    pub min_occurs: String,
    #[serde(default = "default_max_occurs")]
    pub max_occurs: String,
    #[serde(default)]
    pub multi_language: bool,
    #[serde(default)]
    pub is_embeddable: bool,
    #[serde(default)]
    pub required: bool,
}

fn default_min_occurs() -> String {
    "0".to_string()
}

fn default_max_occurs() -> String {
    "1".to_string()
}

impl PropertyModel {
    /// Name without the class prefix, used as the schema property key
    pub fn unprefixed_name(&self) -> &str {
        match self.short_name.as_deref() {
            Some(short) if !short.is_empty() => short,
            _ => unprefix(&self.property),
        }
    }

    pub fn primary_range(&self) -> Option<&str> {
        self.range.first().map(String::as_str)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_occurs == UNBOUNDED
    }

    /// `minOccurs == "1"`
    pub fn is_mandatory(&self) -> bool {
        self.min_occurs == "1"
    }
}

/// One allowed value of an enumerated range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEntry {
    pub id: String,
    #[serde(default)]
    pub value: String,
}

/// Closed classification of a property's primary range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    String,
    Boolean,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    KeyValue,
    KeyAny,
    /// A domain class or an unrecognized type
    Other,
}

impl RangeKind {
    pub fn classify(range: &str) -> Self {
        match range {
            "xsd:string" => RangeKind::String,
            "xsd:boolean" => RangeKind::Boolean,
            "xsd:integer" => RangeKind::Integer,
            "xsd:nonNegativeInteger" => RangeKind::NonNegativeInteger,
            "xsd:positiveInteger" => RangeKind::PositiveInteger,
            "MZ.keyValue" => RangeKind::KeyValue,
            "MZ.keyAny" => RangeKind::KeyAny,
            _ => RangeKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_property_defaults() {
        let prop: PropertyModel = serde_json::from_value(json!({
            "property": "MY.locality",
            "range": ["xsd:string"]
        }))
        .unwrap();
        assert_eq!(prop.unprefixed_name(), "locality");
        assert_eq!(prop.max_occurs, "1");
        assert!(!prop.is_mandatory());
        assert!(!prop.is_unbounded());
    }

    #[test]
    fn test_short_name_wins_over_property_id() {
        let prop: PropertyModel = serde_json::from_value(json!({
            "property": "MY.gatherings",
            "shortName": "gatherings",
            "maxOccurs": "unbounded",
            "isEmbeddable": true
        }))
        .unwrap();
        assert_eq!(prop.unprefixed_name(), "gatherings");
        assert!(prop.is_unbounded());
        assert!(prop.is_embeddable);
    }

    #[test]
    fn test_classify_range_kinds() {
        assert_eq!(RangeKind::classify("xsd:string"), RangeKind::String);
        assert_eq!(RangeKind::classify("xsd:positiveInteger"), RangeKind::PositiveInteger);
        assert_eq!(RangeKind::classify("MZ.keyAny"), RangeKind::KeyAny);
        assert_eq!(RangeKind::classify("MY.gathering"), RangeKind::Other);
    }
}
