use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::errors::BackendError;
use crate::store::KvStore;

/// A store that fails one side of the interface, for exercising the
/// self-healing paths.
pub(crate) enum FailingStore {
    /// Reads fail, writes are accepted and discarded.
    Reads,
    /// Reads return nothing, writes fail.
    Writes,
}

fn io_failure() -> BackendError {
    BackendError::StorageIo {
        source: std::io::Error::new(std::io::ErrorKind::Other, "synthetic failure"),
    }
}

impl KvStore for FailingStore {
    fn get(&self, _key: &str) -> BoxFuture<Result<Option<Value>, BackendError>> {
        let result = match self {
            FailingStore::Reads => Err(io_failure()),
            FailingStore::Writes => Ok(None),
        };

        async move { result }.boxed()
    }

    fn set(&self, _key: &str, _value: Value) -> BoxFuture<Result<(), BackendError>> {
        let result = match self {
            FailingStore::Reads => Ok(()),
            FailingStore::Writes => Err(io_failure()),
        };

        async move { result }.boxed()
    }
}
