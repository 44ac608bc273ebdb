use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::{KeyValueStore, StorageError};

/// File-backed key-value store: one `<key>.json` file per key.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `data_dir`. The directory is created on first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the file path backing `key`.
    pub fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        Self::validate_key(key)?;
        Ok(self.data_dir.join(format!("{}.json", key.replace(':', "."))))
    }

    /// Rejects keys that could escape the data directory.
    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key)?;

        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path(key)?;

        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| StorageError::Io {
                path: self.data_dir.clone(),
                source,
            })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .await
            .map_err(|source| StorageError::Io {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| StorageError::Io { path, source })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[test]
    fn test_path_maps_counter_keys() {
        let (store, _temp) = test_store();
        let path = store.path("pregnancy:seq").unwrap();
        assert!(path.ends_with("pregnancy.seq.json"));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let (store, _temp) = test_store();
        assert!(store.path("../etc/passwd").is_err());
        assert!(store.path("a/b").is_err());
        assert!(store.path(".hidden").is_err());
        assert!(store.path("").is_err());
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let (store, _temp) = test_store();
        assert!(store.get("pregnancy").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data");
        let store = FileStore::new(nested.clone());

        store.set("referrals", "[]".to_string()).await.unwrap();

        assert!(nested.join("referrals.json").exists());
        assert!(!nested.join("referrals.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let (store, _temp) = test_store();
        store.set("ashaProfile", "{\"a\":1}".to_string()).await.unwrap();
        store.set("ashaProfile", "{\"a\":2}".to_string()).await.unwrap();

        assert_eq!(
            store.get("ashaProfile").await.unwrap(),
            Some("{\"a\":2}".to_string())
        );
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let (store, temp) = test_store();
        store.set("childHealth:seq", "4".to_string()).await.unwrap();

        let reopened = FileStore::new(temp.path().to_path_buf());
        assert_eq!(
            reopened.get("childHealth:seq").await.unwrap(),
            Some("4".to_string())
        );
    }
}
