//! Durable key-value storage.
//!
//! Everything the device persists is a string value under a string key:
//!
//! ```text
//! pregnancy            -> JSON array of records (one partition per module)
//! pregnancy:seq        -> last allocated client id number
//! ashaProfile          -> JSON profile
//! phcProfile           -> JSON profile
//! ashaList             -> JSON array of roster members
//! ```
//!
//! The record store and profile registry are written against the
//! [`KeyValueStore`] trait so tests can use [`MemoryStore`] and the CLI can
//! plug in its SQLite backend.

mod file;
mod memory;

use std::future::Future;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A durable string-to-string map.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, `None` if absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error reading or writing a file.
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be decoded.
    #[error("corrupt value under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A key the backend cannot represent.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Backend specific failure (database, lock poisoning, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Loads and decodes a JSON value.
pub(crate) async fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            }),
        _ => Ok(None),
    }
}

/// Encodes and stores a JSON value.
pub(crate) async fn save_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: KeyValueStore,
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    store.set(key, raw).await
}
