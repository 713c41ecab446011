//! Form Expander
//!
//! Turns a stored Master into a self-contained [`ExpandedMaster`]:
//!
//! 1. **Base form**: follow `baseFormID` to the root of the chain and merge
//!    each ancestor under its child. `translations` and `uiSchema` are deep
//!    merged, every other top-level key is taken from the child when present.
//! 2. **Fields form**: fully expand the form named by `fieldsFormID` and take
//!    its `fields` wholesale; `translations`/`uiSchema` are deep merged under
//!    the current Master, `context` fills in only when missing.
//! 3. **Patch**: apply the JSON-Patch operations atomically.
//! 4. **Defaulting**: `uiSchema` is always present afterwards.
//!
//! A form id seen twice along one reference walk is `CyclicInheritance`.

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{CompileError, Result};
use crate::forms::{ExpandedMaster, FormStorage, Master};
use crate::json::deep_merge;

const DEEP_MERGED_KEYS: [&str; 2] = ["translations", "uiSchema"];

type Document = Map<String, Value>;

/// Resolves Master references against a [`FormStorage`]
pub struct FormExpander {
    storage: Arc<dyn FormStorage>,
}

impl FormExpander {
    pub fn new(storage: Arc<dyn FormStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn FormStorage> {
        &self.storage
    }

    /// Expand `master` into a Master with no unresolved references
    pub async fn expand(
        &self,
        master: &Master,
        cancel: Option<&CancellationToken>,
    ) -> Result<ExpandedMaster> {
        tracing::info!(id = master.id.as_deref().unwrap_or("<unsaved>"), "expanding form");
        let chain: Vec<String> = master.id.iter().cloned().collect();
        let mut document = into_document(master.to_json()?)?;

        document = self.resolve_base(document, chain.clone(), cancel).await?;
        document = self.resolve_fields_form(document, chain, cancel).await?;
        document = apply_patch(document)?;

        if !document.contains_key("uiSchema") {
            document.insert("uiSchema".to_string(), Value::Object(Map::new()));
        }
        check_cancelled(cancel)?;
        ExpandedMaster::from_document(document)
    }

    /// Expand a form fetched by id
    pub async fn expand_by_id(
        &self,
        id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<ExpandedMaster> {
        check_cancelled(cancel)?;
        let master = self.storage.get_form(id, cancel).await?;
        self.expand(&master, cancel).await
    }

    /// Steps 1-3 for a form reached through `fieldsFormID`
    fn resolve_all<'a>(
        &'a self,
        document: Document,
        chain: Vec<String>,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<Document>> {
        async move {
            let document = self.resolve_base(document, chain.clone(), cancel).await?;
            let document = self.resolve_fields_form(document, chain, cancel).await?;
            apply_patch(document)
        }
        .boxed()
    }

    fn resolve_base<'a>(
        &'a self,
        mut document: Document,
        chain: Vec<String>,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<Document>> {
        async move {
            let Some(base_id) = take_reference(&mut document, "baseFormID")? else {
                return Ok(document);
            };
            let chain = extend_chain(chain, &base_id)?;
            let base = self.fetch(&base_id, cancel).await?;

            let mut base = self.resolve_base(base, chain, cancel).await?;
            base.remove("id");
            tracing::debug!(base = %base_id, "merging base form");

            let mut merged = base;
            for (key, value) in document {
                let value = match merged.get(&key) {
                    Some(parent) if DEEP_MERGED_KEYS.contains(&key.as_str()) => {
                        deep_merge(parent, &value)
                    }
                    _ => value,
                };
                merged.insert(key, value);
            }
            merged.remove("baseFormID");
            Ok(merged)
        }
        .boxed()
    }

    async fn resolve_fields_form(
        &self,
        mut document: Document,
        chain: Vec<String>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Document> {
        let Some(fields_id) = take_reference(&mut document, "fieldsFormID")? else {
            return Ok(document);
        };
        let chain = extend_chain(chain, &fields_id)?;
        let source = self.fetch(&fields_id, cancel).await?;
        let mut source = self.resolve_all(source, chain, cancel).await?;
        tracing::debug!(fields_form = %fields_id, "including fields form");

        match source.remove("fields") {
            Some(fields) => {
                document.insert("fields".to_string(), fields);
            }
            None => {
                document.remove("fields");
            }
        }
        for key in DEEP_MERGED_KEYS {
            if let Some(from_source) = source.remove(key) {
                let value = match document.get(key) {
                    Some(own) => deep_merge(&from_source, own),
                    None => from_source,
                };
                document.insert(key.to_string(), value);
            }
        }
        if !document.contains_key("context") {
            if let Some(context) = source.remove("context") {
                document.insert("context".to_string(), context);
            }
        }
        Ok(document)
    }

    async fn fetch(&self, id: &str, cancel: Option<&CancellationToken>) -> Result<Document> {
        check_cancelled(cancel)?;
        let master = self.storage.get_form(id, cancel).await?;
        check_cancelled(cancel)?;
        into_document(master.to_json()?)
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<()> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        return Err(CompileError::Cancelled);
    }
    Ok(())
}

fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CompileError::InvalidMaster(format!("expected an object, got {}", other))),
    }
}

/// Remove `key` and return it as a form id; `null` counts as absent
fn take_reference(document: &mut Document, key: &str) -> Result<Option<String>> {
    match document.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(other) => Err(CompileError::InvalidMaster(format!(
            "{} must be a string, got {}",
            key, other
        ))),
    }
}

fn extend_chain(mut chain: Vec<String>, id: &str) -> Result<Vec<String>> {
    let seen = chain.iter().any(|c| c == id);
    chain.push(id.to_string());
    if seen {
        return Err(CompileError::CyclicInheritance { chain });
    }
    Ok(chain)
}

/// Apply and remove `patch`. All operations succeed or the document is
/// left untouched and an error is returned.
fn apply_patch(mut document: Document) -> Result<Document> {
    let patch = match document.remove("patch") {
        None | Some(Value::Null) => return Ok(document),
        Some(patch) => patch,
    };
    let patch: json_patch::Patch = serde_json::from_value(patch)
        .map_err(|e| CompileError::PatchApplication(format!("malformed patch: {}", e)))?;

    let mut target = Value::Object(document);
    json_patch::patch(&mut target, &patch)
        .map_err(|e| CompileError::PatchApplication(e.to_string()))?;
    match target {
        Value::Object(map) => Ok(map),
        _ => Err(CompileError::PatchApplication(
            "patch replaced the Master with a non-object".to_string(),
        )),
    }
}
