//! Current-store selection.
//!
//! Tracks the stores known to the app and which one is active, and persists
//! the active store id under [`ACTIVE_STORE_KEY`](crate::persist::ACTIVE_STORE_KEY)
//! so it survives restart.

mod model;
mod selection;

pub use model::{SelectionState, SelectionStatus, Store, StoreId};
pub use selection::StoreSelection;

pub(crate) use selection::SelectionInner;
