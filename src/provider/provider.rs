use crate::config::Config;
use crate::error::SelectionError;
use crate::error_log::{ErrorLog, ErrorLogInner};
use crate::persist::{FileStorage, KeyValueStorage};
use crate::selection::{SelectionInner, Store, StoreSelection};
use std::sync::Arc;
use tracing::{info, warn};

/// Owner of the application state, constructed once at startup.
///
/// Views receive [`StoreSelection`] and [`ErrorLog`] handles from the provider
/// instead of reaching for globals. The handles only hold weak references:
/// after [`Provider::teardown`] (or drop) every operation on them fails with
/// [`ScopeError`](crate::ScopeError).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use stockroom::{MemoryStorage, Provider, Store};
///
/// # tokio_test_block_on(async {
/// let provider = Provider::new(
///     vec![Store::new(1, "Main"), Store::new(2, "Branch")],
///     Arc::new(MemoryStorage::new()),
/// )
/// .unwrap();
///
/// let selection = provider.store_selection();
/// selection.select_store(2).await.unwrap();
/// assert_eq!(selection.active_store().unwrap().unwrap().name, "Branch");
///
/// provider.teardown();
/// assert!(selection.active_store().is_err());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Provider {
    selection: Arc<SelectionInner>,
    error_log: Arc<ErrorLogInner>,
}

impl Provider {
    /// Create a provider for `stores`, persisting the selection to `storage`.
    ///
    /// Fails if two stores share an id. Call
    /// [`StoreSelection::restore`] afterwards to pick up a persisted selection.
    pub fn new(
        stores: Vec<Store>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self, SelectionError> {
        let selection = Arc::new(SelectionInner::new(stores, storage)?);
        Ok(Self {
            selection,
            error_log: Arc::new(ErrorLogInner::default()),
        })
    }

    /// Create a provider backed by a [`FileStorage`] at
    /// [`Config::storage_path`] and restore the persisted selection.
    ///
    /// Unreadable local storage does not stop startup: the provider starts
    /// with no active store and the next selection rewrites the file.
    pub async fn from_config(config: &Config) -> Result<Self, SelectionError> {
        let storage = Arc::new(FileStorage::new(config.storage_path()));
        let provider = Self::new(config.stores.clone(), storage)?;
        if let Err(err) = provider.store_selection().restore().await {
            warn!(error = %err, "Could not restore active store, starting without one");
        }
        info!(
            stores = config.stores.len(),
            path = %config.storage_path().display(),
            "Provider ready"
        );
        Ok(provider)
    }

    pub fn store_selection(&self) -> StoreSelection {
        StoreSelection::new(&self.selection)
    }

    pub fn error_log(&self) -> ErrorLog {
        ErrorLog::new(&self.error_log)
    }

    /// Drop all state. Handles issued by this provider go out of scope.
    pub fn teardown(self) {
        info!("Provider torn down");
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").finish_non_exhaustive()
    }
}
