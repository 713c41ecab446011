//! Form storage
//!
//! Where Masters are read from during expansion. Two backends:
//! - `InMemoryFormStorage`: process-local map, used by tests and embedders
//! - `FileFormStorage`: one `<id>.json` file per form in a directory

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::model::Master;
use crate::error::StorageError;

/// Form storage collaborator
#[async_trait]
pub trait FormStorage: Send + Sync {
    /// Fetch a Master by id; a missing form is `StorageError::NotFound`
    async fn get_form(
        &self,
        id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Master, StorageError>;

    /// Store a Master under its own `id`
    async fn update_form(&self, master: &Master) -> Result<(), StorageError>;
}

fn master_id(master: &Master) -> Result<&str, StorageError> {
    master
        .id
        .as_deref()
        .ok_or_else(|| StorageError::Backend("Master has no id".to_string()))
}

#[derive(Default)]
pub struct InMemoryFormStorage {
    forms: RwLock<HashMap<String, Master>>,
}

impl InMemoryFormStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a storage holding `masters`, keyed by their ids
    pub fn with_forms(masters: impl IntoIterator<Item = Master>) -> Result<Self, StorageError> {
        let storage = Self::new();
        {
            let mut forms = storage.forms.write();
            for master in masters {
                let id = master_id(&master)?.to_string();
                forms.insert(id, master);
            }
        }
        Ok(storage)
    }

    pub fn len(&self) -> usize {
        self.forms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FormStorage for InMemoryFormStorage {
    async fn get_form(
        &self,
        id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Master, StorageError> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StorageError::Cancelled);
        }
        self.forms
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn update_form(&self, master: &Master) -> Result<(), StorageError> {
        let id = master_id(master)?.to_string();
        self.forms.write().insert(id, master.clone());
        Ok(())
    }
}

/// Directory of `<id>.json` files
pub struct FileFormStorage {
    root: PathBuf,
}

impl FileFormStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StorageError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(StorageError::Backend(format!("invalid form id '{}'", id)));
        }
        Ok(self.root.join(format!("{}.json", id)))
    }

    async fn read(&self, id: &str) -> Result<Master, StorageError> {
        let path = self.path_for(id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl FormStorage for FileFormStorage {
    async fn get_form(
        &self,
        id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Master, StorageError> {
        tracing::debug!(id, root = %self.root.display(), "reading form");
        match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(StorageError::Cancelled),
                result = self.read(id) => result,
            },
            None => self.read(id).await,
        }
    }

    async fn update_form(&self, master: &Master) -> Result<(), StorageError> {
        let path = self.path_for(master_id(master)?)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let content = serde_json::to_string_pretty(master)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn master(id: &str) -> Master {
        Master::from_json(json!({"id": id, "fields": [{"name": "MY.gatherings"}]})).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_not_found() {
        let storage = InMemoryFormStorage::new();
        let err = storage.get_form("JX.404", None).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(id) if id == "JX.404"));
    }

    #[tokio::test]
    async fn test_in_memory_update_then_get() {
        let storage = InMemoryFormStorage::new();
        storage.update_form(&master("JX.1")).await.unwrap();
        assert_eq!(storage.get_form("JX.1", None).await.unwrap(), master("JX.1"));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let storage = InMemoryFormStorage::with_forms([master("JX.1")]).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = storage.get_form("JX.1", Some(&token)).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
    }

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempdir().unwrap();
        let storage = FileFormStorage::new(dir.path());
        storage.update_form(&master("JX.2")).await.unwrap();
        assert!(dir.path().join("JX.2.json").exists());
        assert_eq!(storage.get_form("JX.2", None).await.unwrap(), master("JX.2"));
    }

    #[tokio::test]
    async fn test_file_storage_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = FileFormStorage::new(dir.path());
        let err = storage.get_form("JX.3", None).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_file_storage_rejects_path_ids() {
        let storage = FileFormStorage::new("/tmp");
        let err = storage.get_form("../etc/passwd", None).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }
}
