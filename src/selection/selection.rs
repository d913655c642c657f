use super::model::{duplicate_id, SelectionState, SelectionStatus, Store, StoreId};
use crate::error::{ScopeError, SelectionError};
use crate::persist::{KeyValueStorage, ACTIVE_STORE_KEY};
use crate::provider::Scoped;
use crate::state::{StateCell, Subscription};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const HANDLE_NAME: &str = "StoreSelection";

/// Provider-owned state behind every [`StoreSelection`] handle.
pub(crate) struct SelectionInner {
    state: StateCell<SelectionState>,
    storage: Arc<dyn KeyValueStorage>,
    /// Held from the write of the active store id until the selection settles.
    write_lock: Mutex<()>,
}

impl SelectionInner {
    pub(crate) fn new(
        stores: Vec<Store>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self, SelectionError> {
        if let Some(id) = duplicate_id(&stores) {
            return Err(SelectionError::DuplicateStoreId(id));
        }
        Ok(Self {
            state: StateCell::new(SelectionState::new(stores)),
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Validate `id` and mark it pending in one step.
    fn begin(&self, id: StoreId) -> Result<(), SelectionError> {
        let mut outcome = Ok(());
        self.state.try_update(|state| {
            outcome = if state.find(id).is_none() {
                Err(SelectionError::NotFound(id))
            } else if !state.pending.insert(id) {
                Err(SelectionError::AlreadyPending(id))
            } else {
                state.status = SelectionStatus::Pending(id);
                Ok(())
            };
            outcome.is_ok()
        });
        outcome
    }

    /// Put back the persisted id that a selection overwrote.
    async fn roll_back(&self, previous: Option<String>) {
        let restored = match &previous {
            Some(value) => self.storage.set(ACTIVE_STORE_KEY, value).await,
            None => self.storage.remove(ACTIVE_STORE_KEY).await,
        };
        match restored {
            Ok(()) => debug!(previous = ?previous, "Rolled back persisted active store"),
            Err(err) => warn!(error = %err, "Failed to roll back persisted active store"),
        }
    }
}

/// Clears the pending marker for an id when a selection ends without
/// settling, e.g. because its future was dropped mid-write.
struct PendingGuard<'a> {
    state: &'a StateCell<SelectionState>,
    id: StoreId,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(state: &'a StateCell<SelectionState>, id: StoreId) -> Self {
        Self {
            state,
            id,
            armed: true,
        }
    }

    fn settle(mut self, f: impl FnOnce(&mut SelectionState)) {
        self.armed = false;
        let id = self.id;
        self.state.update(|state| {
            state.pending.remove(&id);
            f(state);
        });
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = self.id;
        self.state.update(|state| {
            state.pending.remove(&id);
            if state.status == SelectionStatus::Pending(id) {
                state.status = SelectionStatus::Idle;
            }
        });
        debug!(store_id = id, "Store selection abandoned before its write settled");
    }
}

/// Handle to the current-store selection.
///
/// Cheap to clone. Every operation fails with [`ScopeError`] once the
/// [`Provider`](crate::Provider) that issued the handle is torn down, and
/// [`StoreSelection::default`] returns a handle that was never in scope.
#[derive(Clone)]
pub struct StoreSelection {
    inner: Scoped<SelectionInner>,
}

impl StoreSelection {
    pub(crate) fn new(inner: &Arc<SelectionInner>) -> Self {
        Self {
            inner: Scoped::new(inner, HANDLE_NAME),
        }
    }

    /// Whether the issuing provider is still alive.
    pub fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    /// Make the store with `id` active and persist the choice.
    ///
    /// The id is written to [`ACTIVE_STORE_KEY`] first; the in-memory active
    /// store only changes once that write has succeeded. While the write is in
    /// flight the id is pending and a second selection of the same id is
    /// rejected with [`SelectionError::AlreadyPending`].
    ///
    /// Selections of different ids may overlap, but their writes and settles
    /// run one at a time in the order the selections started, so the last
    /// started selection wins in memory and in storage alike. If the store is
    /// removed from the collection while its write is in flight, the previous
    /// persisted value is written back and `NotFound` is returned.
    pub async fn select_store(&self, id: StoreId) -> Result<Store, SelectionError> {
        let inner = self.inner.get()?;

        if let Err(err) = inner.begin(id) {
            warn!(store_id = id, error = %err, "Store selection rejected");
            return Err(err);
        }

        let guard = PendingGuard::new(&inner.state, id);
        let _write = inner.write_lock.lock().await;
        let previous = match inner.storage.get(ACTIVE_STORE_KEY).await {
            Ok(previous) => previous,
            Err(err) => {
                warn!(error = %err, "Could not read persisted active store");
                None
            }
        };
        debug!(store_id = id, "Persisting active store");
        let written = inner.storage.set(ACTIVE_STORE_KEY, &id.to_string()).await;

        match written {
            Ok(()) => {
                let mut selected = None;
                guard.settle(|state| {
                    selected = state.find(id).cloned();
                    match &selected {
                        Some(store) => {
                            state.active = Some(store.clone());
                            state.status = SelectionStatus::Settled(Ok(id));
                        }
                        None => {
                            state.status = SelectionStatus::Settled(Err(
                                SelectionError::NotFound(id).to_string(),
                            ));
                        }
                    }
                });
                match selected {
                    Some(store) => {
                        info!(store_id = id, name = %store.name, "Active store changed");
                        Ok(store)
                    }
                    None => {
                        warn!(store_id = id, "Store was removed while its selection was pending");
                        inner.roll_back(previous).await;
                        Err(SelectionError::NotFound(id))
                    }
                }
            }
            Err(err) => {
                warn!(store_id = id, error = %err, "Failed to persist active store");
                let message = err.to_string();
                guard.settle(|state| state.status = SelectionStatus::Settled(Err(message)));
                Err(err.into())
            }
        }
    }

    /// Activate the persisted store, if there is one and it is still known.
    ///
    /// Meant to run once at startup. Unparseable or unknown ids are ignored.
    pub async fn restore(&self) -> Result<Option<Store>, SelectionError> {
        let inner = self.inner.get()?;

        let Some(raw) = inner.storage.get(ACTIVE_STORE_KEY).await? else {
            debug!("No persisted active store");
            return Ok(None);
        };
        let Ok(id) = raw.trim().parse::<StoreId>() else {
            warn!(value = %raw, "Ignoring unparseable persisted store id");
            return Ok(None);
        };

        let mut restored = None;
        inner.state.try_update(|state| {
            restored = state.find(id).cloned();
            match &restored {
                Some(store) if state.active.as_ref() != Some(store) => {
                    state.active = Some(store.clone());
                    true
                }
                _ => false,
            }
        });

        match &restored {
            Some(store) => info!(store_id = id, name = %store.name, "Restored active store"),
            None => warn!(store_id = id, "Persisted store id is not a known store"),
        }
        Ok(restored)
    }

    /// The active store, or `None` if none has been chosen.
    pub fn active_store(&self) -> Result<Option<Store>, ScopeError> {
        Ok(self.inner.get()?.state.read(|state| state.active.clone()))
    }

    /// The known store collection.
    pub fn stores(&self) -> Result<Vec<Store>, ScopeError> {
        Ok(self.inner.get()?.state.read(|state| state.all_stores.clone()))
    }

    /// Replace the known store collection.
    ///
    /// An active store that is missing from `stores` is cleared in memory;
    /// the persisted id is left alone.
    pub fn set_stores(&self, stores: Vec<Store>) -> Result<(), SelectionError> {
        let inner = self.inner.get()?;
        if let Some(id) = duplicate_id(&stores) {
            return Err(SelectionError::DuplicateStoreId(id));
        }

        let count = stores.len();
        let dropped = inner.state.update(|state| {
            let previous = state.active.take();
            state.active = previous
                .as_ref()
                .and_then(|active| stores.iter().find(|store| store.id == active.id).cloned());
            state.all_stores = stores;
            previous.filter(|_| state.active.is_none())
        });

        if let Some(store) = dropped {
            info!(store_id = store.id, "Active store no longer available, cleared");
        }
        debug!(count, "Store collection replaced");
        Ok(())
    }

    /// Whether a selection of `id` is waiting on its write.
    pub fn is_pending(&self, id: StoreId) -> Result<bool, ScopeError> {
        Ok(self.inner.get()?.state.read(|state| state.is_pending(id)))
    }

    /// All ids whose selection is waiting on its write, ascending.
    pub fn pending(&self) -> Result<Vec<StoreId>, ScopeError> {
        Ok(self
            .inner
            .get()?
            .state
            .read(|state| state.pending.iter().copied().collect()))
    }

    /// Progress of the most recent selection.
    pub fn status(&self) -> Result<SelectionStatus, ScopeError> {
        Ok(self.inner.get()?.state.read(|state| state.status.clone()))
    }

    /// Full snapshot of the selection state.
    pub fn snapshot(&self) -> Result<SelectionState, ScopeError> {
        Ok(self.inner.get()?.state.get())
    }

    /// Run `callback` synchronously after every change.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, ScopeError>
    where
        F: Fn(&SelectionState) + Send + Sync + 'static,
    {
        Ok(self.inner.get()?.state.subscribe(callback))
    }
}

impl Default for StoreSelection {
    fn default() -> Self {
        Self {
            inner: Scoped::detached(HANDLE_NAME),
        }
    }
}

impl std::fmt::Debug for StoreSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSelection")
            .field("live", &self.is_live())
            .finish()
    }
}
