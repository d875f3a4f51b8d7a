//! File-backed secret storage implementation.
//!
//! Secrets are kept as a flat JSON object in a single file:
//!
//! ```json
//! { "version": 1, "entries": { "tripwatch/session": "..." } }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{Secret, SecretStore, StoreError};

#[derive(Debug, Serialize, Deserialize)]
struct FileStoreData {
    /// Version of the store format (for future migrations).
    version: u32,

    entries: BTreeMap<String, Secret>,
}

impl Default for FileStoreData {
    fn default() -> Self {
        Self {
            version: 1,
            entries: BTreeMap::new(),
        }
    }
}

/// Secret store persisted as JSON on disk.
///
/// Every operation re-reads the file, so several processes sharing the same
/// data directory observe each other's writes. On Unix the file is created
/// with owner-only permissions.
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by the file at `path`.
    ///
    /// The file and its parent directories are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the storage path for this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_data(&self) -> Result<FileStoreData, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(FileStoreData::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileStoreData::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_data(&self, data: &FileStoreData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.path, contents).await?;
        restrict_permissions(&self.path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("path", &self.path).finish()
    }
}

#[async_trait]
impl SecretStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        let data = self.read_data().await?;
        Ok(data.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.read_data().await?;
        data.entries.insert(key.to_string(), secret.clone());
        self.write_data(&data).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.read_data().await?;
        if data.entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_data(&data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("nested").join("credentials.json"));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let (store, _dir) = test_store();
        assert!(store.get("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let (store, _dir) = test_store();
        store.set("a", &Secret::new("1")).await.unwrap();
        store.set("b", &Secret::new("2")).await.unwrap();

        let reopened = FileStore::new(store.path().to_path_buf());
        assert_eq!(reopened.get("a").await.unwrap().unwrap().expose(), "1");
        assert_eq!(reopened.get("b").await.unwrap().unwrap().expose(), "2");
    }

    #[tokio::test]
    async fn test_file_store_delete() {
        let (store, _dir) = test_store();
        store.set("a", &Secret::new("1")).await.unwrap();

        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_garbage_is_an_error() {
        let (store, _dir) = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();

        let result = store.get("a").await;
        assert!(matches!(result, Err(StoreError::SerializationError(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _dir) = test_store();
        store.set("a", &Secret::new("1")).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
