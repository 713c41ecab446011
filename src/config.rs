//! Configuration for the form compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (form-compiler.toml)
//! - Environment variables (FORM_COMPILER__*)
//!
//! ## Example config file (form-compiler.toml):
//! ```toml
//! [metadata]
//! base_url = "https://api.laji.fi/v0"
//! timeout_secs = 30
//! default_prefix = "MY."
//!
//! [storage]
//! forms_dir = "./forms"
//!
//! [compiler]
//! default_language = "fi"
//! root_class = "document"
//! title_overrides = ["MY.gatherings", "MY.units"]
//!
//! [[compiler.required_overrides]]
//! property = "MY.gatherings"
//! required = false
//! ```
//!
//! Property ids are values, never table keys: the config loader lowercases
//! keys, which would turn `MY.gatherings` into `my.gatherings`.

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::compile::overrides::{default_required, default_untitled};
use crate::compile::{CompilerOverrides, DEFAULT_ROOT_CLASS};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Metadata API settings
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Form storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Compilation settings
    #[serde(default)]
    pub compiler: CompileSettings,
}

/// Metadata API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Base URL the `/metadata/...` paths are appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prefix qualifying bare class names
    #[serde(default = "default_prefix")]
    pub default_prefix: String,
}

/// Form storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of `<id>.json` Masters
    #[serde(default = "default_forms_dir")]
    pub forms_dir: PathBuf,
}

/// Compilation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileSettings {
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Class of the top-level fields when a Master has no `context`
    #[serde(default = "default_root_class")]
    pub root_class: String,

    /// Properties whose title is never shown
    #[serde(default = "default_untitled")]
    pub title_overrides: BTreeSet<String>,

    /// Forced required/optional properties
    #[serde(default = "default_required_overrides")]
    pub required_overrides: Vec<RequiredOverride>,
}

/// One `[[compiler.required_overrides]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredOverride {
    /// Fully qualified property id, e.g. `MY.gatherings`
    pub property: String,
    pub required: bool,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_prefix() -> String {
    "MY.".to_string()
}

fn default_forms_dir() -> PathBuf {
    PathBuf::from("forms")
}

fn default_language() -> String {
    "fi".to_string()
}

fn default_root_class() -> String {
    DEFAULT_ROOT_CLASS.to_string()
}

fn default_required_overrides() -> Vec<RequiredOverride> {
    default_required()
        .into_iter()
        .map(|(property, required)| RequiredOverride { property, required })
        .collect()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            default_prefix: default_prefix(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            forms_dir: default_forms_dir(),
        }
    }
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            root_class: default_root_class(),
            title_overrides: default_untitled(),
            required_overrides: default_required_overrides(),
        }
    }
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CompileSettings {
    pub fn overrides(&self) -> CompilerOverrides {
        CompilerOverrides {
            untitled: self.title_overrides.clone(),
            required: self
                .required_overrides
                .iter()
                .map(|entry| (entry.property.clone(), entry.required))
                .collect(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, optionally adding a required config file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "form-compiler.toml",
            ".form-compiler.toml",
            "config/form-compiler.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("fi", "laji", "form-compiler") {
            let xdg_config = config_dir.config_dir().join("form-compiler.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // FORM_COMPILER__METADATA__BASE_URL etc.
        builder = builder.add_source(
            Environment::with_prefix("FORM_COMPILER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.compiler.default_language, "fi");
        assert_eq!(config.compiler.root_class, "document");
        assert_eq!(config.metadata.default_prefix, "MY.");
        assert_eq!(config.compiler.overrides(), CompilerOverrides::default());
    }

    #[test]
    fn test_serialize_config() {
        let config = CompilerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[metadata]"));
        assert!(toml_str.contains("[compiler]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[metadata]\nbase_url = \"https://example.org\"\n\n\
             [compiler]\nroot_class = \"MY.document\"\ntitle_overrides = []\n",
        )
        .unwrap();

        let config = CompilerConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.metadata.base_url, "https://example.org");
        assert_eq!(config.compiler.root_class, "MY.document");
        assert!(config.compiler.title_overrides.is_empty());
        assert_eq!(config.metadata.timeout_secs, 30);
    }

    #[test]
    fn test_required_overrides_keep_property_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overrides.toml");
        std::fs::write(
            &path,
            r#"
[compiler]
title_overrides = ["MY.gatheringEvent"]

[[compiler.required_overrides]]
property = "MY.gatherings"
required = true

[[compiler.required_overrides]]
property = "MZ.publicityRestrictions"
required = false
"#,
        )
        .unwrap();

        let config = CompilerConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        let overrides = config.compiler.overrides();
        assert_eq!(overrides.required_override("MY.gatherings"), Some(true));
        assert_eq!(overrides.required_override("MZ.publicityRestrictions"), Some(false));
        // the file's table replaces the built-in one
        assert_eq!(overrides.required_override("MY.units"), None);
        assert!(overrides.is_untitled("MY.gatheringEvent"));
        assert!(!overrides.is_untitled("MY.gatherings"));
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        CompilerConfig::default().save(path.to_str().unwrap()).unwrap();

        let config = CompilerConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.compiler.overrides(), CompilerOverrides::default());
    }
}
