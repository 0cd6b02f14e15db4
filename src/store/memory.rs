use std::collections::HashMap;
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::errors::BackendError;
use crate::store::KvStore;

/// A store that keeps documents in process memory. Used when no
/// storage path is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the document under `key` without going through the
    /// async interface. Useful for seeding fixtures.
    pub fn seed(&self, key: impl Into<String>, value: Value) {
        self.map.write().expect("seed store").insert(key.into(), value);
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<Result<Option<Value>, BackendError>> {
        read(self, key.to_owned()).boxed()
    }

    fn set(&self, key: &str, value: Value) -> BoxFuture<Result<(), BackendError>> {
        write(self, key.to_owned(), value).boxed()
    }
}

async fn read(store: &MemoryStore, key: String) -> Result<Option<Value>, BackendError> {
    Ok(store.map.read().expect("read store").get(&key).cloned())
}

async fn write(store: &MemoryStore, key: String, value: Value) -> Result<(), BackendError> {
    store.map.write().expect("write store").insert(key, value);

    Ok(())
}
