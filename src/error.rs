//! Crate-level error types.

use crate::selection::StoreId;

/// A handle was used outside the lifetime of the provider that issued it.
///
/// This is a programming error: a view consumed a store without a live
/// [`Provider`](crate::Provider) above it, or kept a handle past teardown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("{0} used outside of its provider")]
    OutOfScope(&'static str),
}

/// The key-value storage backend failed.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by a storage backend that has no richer error type.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Error returned when changing the active store fails.
///
/// None of these mutate the active store.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// The id is not in the known store collection.
    #[error("store {0} not found")]
    NotFound(StoreId),

    /// A selection of the same store is still waiting on its write.
    #[error("selection of store {0} is already pending")]
    AlreadyPending(StoreId),

    /// The store collection contains the same id twice.
    #[error("duplicate store id {0}")]
    DuplicateStoreId(StoreId),

    #[error("failed to persist active store: {0}")]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
