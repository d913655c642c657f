use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: usize,
    entries: Vec<(usize, Subscriber<T>)>,
}

/// State plus a counter bumped on every committed change.
struct Versioned<T> {
    version: u64,
    value: T,
}

impl<T: Clone> Versioned<T> {
    fn bump(&mut self) -> (u64, T) {
        self.version += 1;
        (self.version, self.value.clone())
    }
}

/// Snapshots waiting to reach subscribers. Only the newest is kept.
struct Delivery<T> {
    queued: Option<(u64, T)>,
    delivered: u64,
    busy: bool,
}

/// Releases the delivery slot if a subscriber panics mid-delivery.
struct DeliveryGuard<'a, T> {
    delivery: &'a Mutex<Delivery<T>>,
    armed: bool,
}

impl<T> Drop for DeliveryGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.delivery
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .busy = false;
        }
    }
}

/// A thread-safe state cell that notifies subscribers synchronously.
///
/// Both the store selection and the error log keep their state in one of
/// these. Every mutation through [`StateCell::update`] or a successful
/// [`StateCell::try_update`] takes its snapshot under the write lock and
/// runs all subscribers before returning, with no lock held, so a subscriber
/// may read the cell again.
///
/// Only one caller delivers at a time. A mutation made while another thread
/// (or an enclosing callback) is delivering hands its snapshot to that
/// deliverer and returns; intermediate snapshots may be skipped, but a
/// subscriber never sees an older state after a newer one.
pub struct StateCell<T> {
    state: Arc<RwLock<Versioned<T>>>,
    subscribers: Arc<RwLock<Subscribers<T>>>,
    delivery: Arc<Mutex<Delivery<T>>>,
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    /// Create a new cell with the given initial state.
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(Versioned {
                version: 0,
                value: initial,
            })),
            subscribers: Arc::new(RwLock::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            })),
            delivery: Arc::new(Mutex::new(Delivery {
                queued: None,
                delivered: 0,
                busy: false,
            })),
        }
    }

    /// Get a clone of the current state.
    pub fn get(&self) -> T {
        self.read_state().value.clone()
    }

    /// Read state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.read_state().value)
    }

    /// Mutate the state and notify subscribers.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let (result, change) = {
            let mut state = self.write_state();
            let result = f(&mut state.value);
            (result, state.bump())
        };
        self.deliver(change);
        result
    }

    /// Mutate the state, notifying subscribers only when `f` reports a change.
    pub fn try_update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        let change = {
            let mut state = self.write_state();
            if !f(&mut state.value) {
                return false;
            }
            state.bump()
        };
        self.deliver(change);
        true
    }

    /// Replace the state and notify subscribers.
    pub fn set(&self, new_state: T) {
        self.update(|state| *state = new_state);
    }

    /// Subscribe to state changes.
    ///
    /// The callback runs after every change until the returned guard is
    /// dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut subscribers = self.write_subscribers();
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.entries.push((id, Arc::new(callback)));
            id
        };

        let subscribers: Weak<RwLock<Subscribers<T>>> = Arc::downgrade(&self.subscribers);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(subscribers) = subscribers.upgrade() {
                    subscribers
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entries
                        .retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    fn deliver(&self, (version, snapshot): (u64, T)) {
        {
            let mut delivery = self.lock_delivery();
            let newer_than_queued = delivery
                .queued
                .as_ref()
                .map_or(true, |(queued, _)| *queued < version);
            if version > delivery.delivered && newer_than_queued {
                delivery.queued = Some((version, snapshot));
            }
            if delivery.busy {
                return;
            }
            delivery.busy = true;
        }

        let mut guard = DeliveryGuard {
            delivery: &self.delivery,
            armed: true,
        };
        loop {
            let snapshot = {
                let mut delivery = self.lock_delivery();
                match delivery.queued.take() {
                    Some((version, snapshot)) => {
                        delivery.delivered = version;
                        snapshot
                    }
                    None => {
                        delivery.busy = false;
                        guard.armed = false;
                        break;
                    }
                }
            };
            let subscribers: Vec<Subscriber<T>> = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            for subscriber in subscribers {
                subscriber(&snapshot);
            }
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Versioned<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Versioned<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_subscribers(&self) -> RwLockWriteGuard<'_, Subscribers<T>> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, Delivery<T>> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            subscribers: Arc::clone(&self.subscribers),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl<T: Default + Clone + Send + Sync + 'static> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// RAII guard for a state subscription.
///
/// Dropping the guard removes the callback. Call [`Subscription::detach`] to
/// keep the callback for the lifetime of the cell instead.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Keep the callback registered until the cell itself is dropped.
    pub fn detach(mut self) {
        self.unsubscribe.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    #[derive(Clone, Debug, PartialEq)]
    struct Shelf {
        count: usize,
        label: String,
    }

    fn shelf() -> StateCell<Shelf> {
        StateCell::new(Shelf {
            count: 0,
            label: "aisle".to_string(),
        })
    }

    #[test]
    fn cell_get_set() {
        let cell = shelf();
        assert_eq!(cell.get().count, 0);

        cell.set(Shelf {
            count: 42,
            label: "updated".to_string(),
        });

        assert_eq!(cell.get().count, 42);
        assert_eq!(cell.get().label, "updated");
    }

    #[test]
    fn cell_update_returns_closure_result() {
        let cell = shelf();
        let previous = cell.update(|state| {
            let previous = state.count;
            state.count += 10;
            previous
        });

        assert_eq!(previous, 0);
        assert_eq!(cell.get().count, 10);
    }

    #[test]
    fn try_update_only_notifies_on_change() {
        let cell = shelf();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let _sub = cell.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!cell.try_update(|_| false));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(cell.try_update(|state| {
            state.count = 3;
            true
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let cell = shelf();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let sub = cell.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        cell.update(|state| state.count += 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(sub);
        assert_eq!(cell.subscriber_count(), 0);
        cell.update(|state| state.count += 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_subscription_stays_registered() {
        let cell = shelf();
        cell.subscribe(|_| {}).detach();
        assert_eq!(cell.subscriber_count(), 1);
    }

    #[test]
    fn subscriber_can_read_cell_during_notify() {
        let cell = shelf();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let reader = cell.clone();

        let _sub = cell.subscribe(move |state| {
            assert_eq!(reader.get(), *state);
            seen_clone.store(state.count, Ordering::SeqCst);
        });

        cell.update(|state| state.count = 7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn concurrent_update_never_leaves_view_on_stale_state() {
        let cell = StateCell::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (reached_tx, reached_rx) = mpsc::channel::<()>();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();
        let reached_tx = Mutex::new(reached_tx);
        let resume_rx = Mutex::new(resume_rx);

        let seen_clone = seen.clone();
        let _sub = cell.subscribe(move |value| {
            seen_clone.lock().unwrap().push(*value);
            if *value == 1 {
                reached_tx.lock().unwrap().send(()).unwrap();
                resume_rx.lock().unwrap().recv().unwrap();
            }
        });

        let first = thread::spawn({
            let cell = cell.clone();
            move || cell.set(1)
        });
        reached_rx.recv().unwrap();

        // first is still inside the subscriber, so this hands off and returns
        let second = thread::spawn({
            let cell = cell.clone();
            move || cell.set(2)
        });
        second.join().unwrap();
        resume_tx.send(()).unwrap();
        first.join().unwrap();

        assert_eq!(cell.get(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn update_from_inside_a_subscriber_is_delivered_after_it() {
        let cell = StateCell::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let writer = cell.clone();

        let _sub = cell.subscribe(move |value| {
            seen_clone.lock().unwrap().push(*value);
            if *value == 1 {
                writer.set(2);
            }
        });

        cell.set(1);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn panicking_subscriber_does_not_wedge_delivery() {
        let cell = StateCell::new(0u32);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let _sub = cell.subscribe(move |value| {
            seen_clone.store(*value as usize, Ordering::SeqCst);
            assert_ne!(*value, 1, "subscriber rejects 1");
        });

        let panicked = thread::spawn({
            let cell = cell.clone();
            move || cell.set(1)
        })
        .join();
        assert!(panicked.is_err());

        cell.set(2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
