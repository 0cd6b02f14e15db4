use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{warn, Logger};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::errors::BackendError;

pub mod memory;
#[cfg(test)]
pub(crate) mod mock;

/// Well-known document keys.
pub mod keys {
    /// The ISRC registry document.
    pub const ISRC_REGISTRY: &str = "isrcRegistry";

    /// The usage tracking document.
    pub const USAGE_TRACKING: &str = "usage_tracking";
}

pub trait KvStore: Send + Sync {
    /// Reads the document stored under the given key.
    fn get(&self, key: &str) -> BoxFuture<Result<Option<Value>, BackendError>>;

    /// Replaces the document stored under the given key.
    fn set(&self, key: &str, value: Value) -> BoxFuture<Result<(), BackendError>>;
}

/// A store that keeps every document as one entry in a single JSON
/// file, rewritten atomically on each change.
pub struct FileStore {
    path: PathBuf,
    logger: Arc<Logger>,
    // writes are read-modify-write cycles over the whole file
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a new instance. The file does not have to exist yet.
    pub fn new(path: impl Into<PathBuf>, logger: Arc<Logger>) -> Self {
        Self {
            path: path.into(),
            logger,
            write_lock: Mutex::new(()),
        }
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> BoxFuture<Result<Option<Value>, BackendError>> {
        read(self, key.to_owned()).boxed()
    }

    fn set(&self, key: &str, value: Value) -> BoxFuture<Result<(), BackendError>> {
        write(self, key.to_owned(), value).boxed()
    }
}

async fn read(store: &FileStore, key: String) -> Result<Option<Value>, BackendError> {
    let mut document = load(store).await?;

    Ok(document.remove(&key))
}

async fn write(store: &FileStore, key: String, value: Value) -> Result<(), BackendError> {
    let _guard = store.write_lock.lock().await;

    let mut document = match load(store).await {
        Ok(document) => document,
        Err(BackendError::StorageDecoding { .. }) => {
            warn!(store.logger, "Replacing unreadable storage file"; "path" => %store.path.display());
            Map::new()
        }
        Err(e) => return Err(e),
    };

    document.insert(key, value);

    let bytes = serde_json::to_vec(&document)
        .map_err(|source| BackendError::StorageDecoding { source })?;

    let directory = match store.path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file =
        NamedTempFile::new_in(directory).map_err(|source| BackendError::StorageIo { source })?;
    file.write_all(&bytes)
        .map_err(|source| BackendError::StorageIo { source })?;
    file.persist(&store.path)
        .map_err(|e| BackendError::StorageIo { source: e.error })?;

    Ok(())
}

async fn load(store: &FileStore) -> Result<Map<String, Value>, BackendError> {
    match tokio::fs::read(&store.path).await {
        Ok(bytes) => {
            serde_json::from_slice(&bytes).map_err(|source| BackendError::StorageDecoding { source })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
        Err(source) => Err(BackendError::StorageIo { source }),
    }
}
