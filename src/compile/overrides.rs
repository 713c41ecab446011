//! Per-property override tables consulted by the field compiler

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fixed exceptions to metadata-derived titles and required flags.
///
/// Keyed by fully qualified property id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOverrides {
    /// Properties that never display a title
    #[serde(default = "default_untitled")]
    pub untitled: BTreeSet<String>,

    /// Forced required (`true`) or forced optional (`false`) properties
    #[serde(default = "default_required")]
    pub required: BTreeMap<String, bool>,
}

pub fn default_untitled() -> BTreeSet<String> {
    [
        "MY.gatherings",
        "MY.gatheringEvent",
        "MY.units",
        "MY.identifications",
        "MY.unitGathering",
        "MY.gatheringFact",
        "MY.unitFact",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_required() -> BTreeMap<String, bool> {
    [
        ("MY.gatherings", false),
        ("MY.units", false),
        ("MY.secureLevel", false),
        ("MZ.publicityRestrictions", true),
    ]
    .iter()
    .map(|(id, required)| (id.to_string(), *required))
    .collect()
}

impl Default for CompilerOverrides {
    fn default() -> Self {
        Self {
            untitled: default_untitled(),
            required: default_required(),
        }
    }
}

impl CompilerOverrides {
    /// No overrides at all
    pub fn empty() -> Self {
        Self {
            untitled: BTreeSet::new(),
            required: BTreeMap::new(),
        }
    }

    pub fn is_untitled(&self, property: &str) -> bool {
        self.untitled.contains(property)
    }

    /// The forced required flag for `property`, if any
    pub fn required_override(&self, property: &str) -> Option<bool> {
        self.required.get(property).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let overrides = CompilerOverrides::default();
        assert!(overrides.is_untitled("MY.gatherings"));
        assert!(!overrides.is_untitled("MY.locality"));
        assert_eq!(overrides.required_override("MY.units"), Some(false));
        assert_eq!(overrides.required_override("MZ.publicityRestrictions"), Some(true));
        assert_eq!(overrides.required_override("MY.locality"), None);
    }
}
