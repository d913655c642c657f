//! Device-local key-value storage.
//!
//! The store selection keeps exactly one entry here, [`ACTIVE_STORE_KEY`],
//! whose value is the decimal id of the active store.

mod file;
mod memory;

use crate::error::PersistenceError;
use async_trait::async_trait;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Key under which the active store id is persisted.
pub const ACTIVE_STORE_KEY: &str = "activeStoreId";

/// String key-value storage that survives process restart.
///
/// Implementations must be usable behind `Arc<dyn KeyValueStorage>` from any
/// task.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}
