//! # Stockroom
//!
//! Client-side state for the pharmacy inventory app.
//!
//! Two independent stores, handed to views by a [`Provider`] built once at
//! startup:
//!
//! - [`StoreSelection`] - the stores known to the app and which one is active.
//!   The active store id is persisted through a [`KeyValueStorage`] under
//!   [`ACTIVE_STORE_KEY`] and restored on the next start.
//! - [`ErrorLog`] - an in-memory, newest-first list of errors recorded during
//!   the session.
//!
//! Both keep their state in a [`StateCell`], which calls subscribers
//! synchronously on every change.

pub mod config;
pub mod error;
pub mod error_log;
pub mod logging;
pub mod persist;
pub mod provider;
pub mod selection;
pub mod state;

// Re-export main types for convenience
pub use config::Config;
pub use error::{ConfigError, PersistenceError, ScopeError, SelectionError};
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use persist::{FileStorage, KeyValueStorage, MemoryStorage, ACTIVE_STORE_KEY};
pub use provider::Provider;
pub use selection::{SelectionState, SelectionStatus, Store, StoreId, StoreSelection};
pub use state::{StateCell, Subscription};
