//! Form compilation: Master → expanded Master → JSON Schema
//!
//! [`FormCompiler`] ties the expander, the metadata service and the field
//! compiler together. The output [`Schemas`] carries the compiled schema plus
//! every other Master key except `fields` and `translations`, with `@`
//! placeholders resolved for the requested language. Compiled keys
//! (`schema`, `validators`, `warnings`, `excludeFromCopy`) always win over
//! Master keys of the same name.

pub mod field;
pub mod overrides;

pub use field::{CompiledField, CompiledGroup, FieldCompiler};
pub use overrides::CompilerOverrides;

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::checksum::Fingerprint;
use crate::error::{CompileError, Result};
use crate::expand::FormExpander;
use crate::forms::{ExpandedMaster, FormStorage, Master};
use crate::json::translate;
use crate::metadata::MetadataService;

/// Class whose properties the top-level fields are matched against
pub const DEFAULT_ROOT_CLASS: &str = "document";

/// Master keys consumed by compilation and not copied to the output
const CONSUMED_KEYS: [&str; 2] = ["fields", "translations"];

/// Output keys owned by the compiler; a Master key of the same name is dropped
const COMPILED_KEYS: [&str; 4] = ["schema", "validators", "warnings", "excludeFromCopy"];

/// Compiled form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schemas {
    pub schema: Value,
    pub validators: Value,
    pub warnings: Value,
    /// Data paths (`$.gatherings[*].units`) of fields excluded from copying
    #[serde(rename = "excludeFromCopy")]
    pub exclude_from_copy: Vec<String>,
    /// Remaining Master keys, translated
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Schemas {
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn fingerprint(&self) -> Result<Fingerprint> {
        Ok(Fingerprint::from_json(&self.to_json()?))
    }
}

/// Expands and compiles Masters
pub struct FormCompiler {
    expander: FormExpander,
    metadata: Arc<MetadataService>,
    overrides: CompilerOverrides,
    root_class: String,
}

impl FormCompiler {
    pub fn new(storage: Arc<dyn FormStorage>, metadata: Arc<MetadataService>) -> Self {
        Self {
            expander: FormExpander::new(storage),
            metadata,
            overrides: CompilerOverrides::default(),
            root_class: DEFAULT_ROOT_CLASS.to_string(),
        }
    }

    pub fn with_overrides(mut self, overrides: CompilerOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_root_class(mut self, root_class: impl Into<String>) -> Self {
        self.root_class = root_class.into();
        self
    }

    pub fn expander(&self) -> &FormExpander {
        &self.expander
    }

    pub fn metadata(&self) -> &Arc<MetadataService> {
        &self.metadata
    }

    pub async fn expand(
        &self,
        master: &Master,
        cancel: Option<&CancellationToken>,
    ) -> Result<ExpandedMaster> {
        self.expander.expand(master, cancel).await
    }

    /// Expand `master` and compile it for `lang`
    pub async fn compile(
        &self,
        master: &Master,
        lang: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Schemas> {
        let expanded = self.expander.expand(master, cancel).await?;
        self.compile_expanded(&expanded, lang, cancel).await
    }

    /// Fetch form `id` from storage, expand and compile it
    pub async fn compile_by_id(
        &self,
        id: &str,
        lang: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Schemas> {
        let expanded = self.expander.expand_by_id(id, cancel).await?;
        self.compile_expanded(&expanded, lang, cancel).await
    }

    /// Compile an already expanded Master
    pub async fn compile_expanded(
        &self,
        expanded: &ExpandedMaster,
        lang: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Schemas> {
        let root_class = expanded.context.as_deref().unwrap_or(&self.root_class);
        tracing::info!(
            id = expanded.id.as_deref().unwrap_or("<unsaved>"),
            lang,
            root_class,
            "compiling form"
        );

        let translations = expanded.translations_for(lang);
        let compiler =
            FieldCompiler::new(&self.metadata, &self.overrides, &translations, lang, cancel);
        let group = compiler.compile_class(root_class, expanded.fields(), "$").await?;

        let mut rest = match serde_json::to_value(expanded)? {
            Value::Object(map) => map,
            _ => {
                return Err(CompileError::InvalidMaster(
                    "expanded Master is not an object".to_string(),
                ))
            }
        };
        for key in CONSUMED_KEYS {
            rest.remove(key);
        }
        for key in COMPILED_KEYS {
            if rest.remove(key).is_some() {
                tracing::warn!(key, "Master key shadows compiled output, dropped");
            }
        }
        let rest = rest
            .into_iter()
            .map(|(key, value)| {
                let translated = translate(&value, &translations);
                (key, translated)
            })
            .collect();

        Ok(Schemas {
            schema: group.object_schema(),
            validators: translate(&Value::Object(group.validators), &translations),
            warnings: translate(&Value::Object(group.warnings), &translations),
            exclude_from_copy: group.exclude_from_copy,
            rest,
        })
    }
}
