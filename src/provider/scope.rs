use crate::error::ScopeError;
use std::sync::{Arc, Weak};
use tracing::error;

/// A weak, lifecycle-checked reference to provider-owned state.
///
/// The provider holds the only long-lived strong reference. Once it is torn
/// down, [`Scoped::get`] fails with [`ScopeError::OutOfScope`].
pub(crate) struct Scoped<T> {
    inner: Weak<T>,
    name: &'static str,
}

impl<T> Scoped<T> {
    pub(crate) fn new(inner: &Arc<T>, name: &'static str) -> Self {
        Self {
            inner: Arc::downgrade(inner),
            name,
        }
    }

    /// A handle that was never inside a provider.
    pub(crate) fn detached(name: &'static str) -> Self {
        Self {
            inner: Weak::new(),
            name,
        }
    }

    pub(crate) fn get(&self) -> Result<Arc<T>, ScopeError> {
        self.inner.upgrade().ok_or_else(|| {
            error!(handle = self.name, "Handle used outside of its provider");
            ScopeError::OutOfScope(self.name)
        })
    }

    pub(crate) fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for Scoped<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
            name: self.name,
        }
    }
}
