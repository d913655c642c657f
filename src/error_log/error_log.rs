use super::entry::ErrorLogEntry;
use crate::error::ScopeError;
use crate::provider::Scoped;
use crate::state::{StateCell, Subscription};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error};

const HANDLE_NAME: &str = "ErrorLog";

/// Provider-owned state behind every [`ErrorLog`] handle. Newest entry first.
#[derive(Default)]
pub(crate) struct ErrorLogInner {
    entries: StateCell<VecDeque<ErrorLogEntry>>,
}

/// Handle to the session error log.
///
/// Entries are kept newest first and only live in memory.
#[derive(Clone)]
pub struct ErrorLog {
    inner: Scoped<ErrorLogInner>,
}

impl ErrorLog {
    pub(crate) fn new(inner: &Arc<ErrorLogInner>) -> Self {
        Self {
            inner: Scoped::new(inner, HANDLE_NAME),
        }
    }

    pub fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    /// Record `message` (trimmed) as the newest entry and return it.
    ///
    /// The entry is stamped under the write lock, so concurrent callers
    /// cannot push an older entry in front of a newer one.
    pub fn log_error(&self, message: impl AsRef<str>) -> Result<ErrorLogEntry, ScopeError> {
        let inner = self.inner.get()?;
        let message = message.as_ref();
        let entry = inner.entries.update(|entries| {
            let entry = ErrorLogEntry::new(message);
            entries.push_front(entry.clone());
            entry
        });
        error!(id = entry.id(), "{}", entry.message());
        Ok(entry)
    }

    /// Remove every entry.
    pub fn clear_logs(&self) -> Result<(), ScopeError> {
        let inner = self.inner.get()?;
        let cleared = inner.entries.update(|entries| {
            let count = entries.len();
            entries.clear();
            count
        });
        debug!(cleared, "Error log cleared");
        Ok(())
    }

    /// Snapshot of the entries, newest first.
    pub fn logs(&self) -> Result<Vec<ErrorLogEntry>, ScopeError> {
        Ok(self
            .inner
            .get()?
            .entries
            .read(|entries| entries.iter().cloned().collect()))
    }

    pub fn len(&self) -> Result<usize, ScopeError> {
        Ok(self.inner.get()?.entries.read(VecDeque::len))
    }

    pub fn is_empty(&self) -> Result<bool, ScopeError> {
        Ok(self.inner.get()?.entries.read(VecDeque::is_empty))
    }

    /// Run `callback` with the entries, newest first, after every change.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, ScopeError>
    where
        F: Fn(&VecDeque<ErrorLogEntry>) + Send + Sync + 'static,
    {
        Ok(self.inner.get()?.entries.subscribe(callback))
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self {
            inner: Scoped::detached(HANDLE_NAME),
        }
    }
}

impl std::fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLog")
            .field("live", &self.is_live())
            .finish()
    }
}
