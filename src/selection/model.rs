use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Identifier of a store.
pub type StoreId = i64;

/// A store (pharmacy branch) known to the application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
}

impl Store {
    pub fn new(id: StoreId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Progress of the most recent store selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SelectionStatus {
    /// No selection has been attempted, or the last one was abandoned.
    #[default]
    Idle,
    /// Waiting for the write of this id to settle.
    Pending(StoreId),
    /// The last selection finished. `Err` carries the failure message.
    Settled(Result<StoreId, String>),
}

/// Snapshot of the store selection, as seen by subscribers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionState {
    pub all_stores: Vec<Store>,
    pub active: Option<Store>,
    /// Ids whose selection write is still in flight.
    pub pending: BTreeSet<StoreId>,
    pub status: SelectionStatus,
}

impl SelectionState {
    pub(crate) fn new(all_stores: Vec<Store>) -> Self {
        Self {
            all_stores,
            ..Self::default()
        }
    }

    pub fn find(&self, id: StoreId) -> Option<&Store> {
        self.all_stores.iter().find(|store| store.id == id)
    }

    pub fn is_pending(&self, id: StoreId) -> bool {
        self.pending.contains(&id)
    }
}

/// First id that occurs more than once in `stores`.
pub(crate) fn duplicate_id(stores: &[Store]) -> Option<StoreId> {
    let mut seen = HashSet::with_capacity(stores.len());
    stores
        .iter()
        .map(|store| store.id)
        .find(|id| !seen.insert(*id))
}
