use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stockroom::{KeyValueStorage, MemoryStorage, PersistenceError};
use tokio::sync::{mpsc, Mutex, Notify, Semaphore};

/// Initialize tracing for tests with proper test output handling
#[allow(dead_code)]
pub fn tracing_init() {
    stockroom::logging::init_for_tests();
}

/// Storage whose writes block until the test releases them.
///
/// Each `set` reports its value on `started`, then waits for one permit on
/// `release` before writing through to `inner`.
#[allow(dead_code)]
pub struct GatedStorage {
    pub inner: MemoryStorage,
    started_tx: mpsc::UnboundedSender<String>,
    started_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    release: Semaphore,
}

#[allow(dead_code)]
impl GatedStorage {
    pub fn new() -> Self {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        Self {
            inner: MemoryStorage::new(),
            started_tx,
            started_rx: Mutex::new(started_rx),
            release: Semaphore::new(0),
        }
    }

    /// Wait until a write has started and return the value being written.
    pub async fn next_write(&self) -> String {
        self.started_rx
            .lock()
            .await
            .recv()
            .await
            .expect("gated storage dropped")
    }

    /// Let `n` blocked writes complete.
    pub fn release(&self, n: usize) {
        self.release.add_permits(n);
    }
}

#[async_trait]
impl KeyValueStorage for GatedStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let _ = self.started_tx.send(value.to_string());
        self.release
            .acquire()
            .await
            .map_err(|e| PersistenceError::Backend(e.to_string()))?
            .forget();
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.inner.remove(key).await
    }
}

/// Storage whose writes land immediately but only complete once acknowledged.
///
/// Each `set` writes through to `inner`, reports its value on `started` and
/// then waits for [`AckStorage::ack`] with that value. Acks may be given in
/// any order, including before the write starts.
#[allow(dead_code)]
pub struct AckStorage {
    pub inner: MemoryStorage,
    started_tx: mpsc::UnboundedSender<String>,
    started_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    acks: std::sync::Mutex<HashMap<String, Arc<Notify>>>,
}

#[allow(dead_code)]
impl AckStorage {
    pub fn new() -> Self {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        Self {
            inner: MemoryStorage::new(),
            started_tx,
            started_rx: Mutex::new(started_rx),
            acks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn ack_for(&self, value: &str) -> Arc<Notify> {
        self.acks
            .lock()
            .unwrap()
            .entry(value.to_string())
            .or_default()
            .clone()
    }

    /// Wait until a write has started and return the value being written.
    pub async fn next_write(&self) -> String {
        self.started_rx
            .lock()
            .await
            .recv()
            .await
            .expect("ack storage dropped")
    }

    /// Let the write of `value` complete.
    pub fn ack(&self, value: &str) {
        self.ack_for(value).notify_one();
    }
}

#[async_trait]
impl KeyValueStorage for AckStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.inner.set(key, value).await?;
        let ack = self.ack_for(value);
        let _ = self.started_tx.send(value.to_string());
        ack.notified().await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.inner.remove(key).await
    }
}

/// Storage that fails every write while `failing` is set.
#[allow(dead_code)]
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    pub failing: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStorage {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStorage for FlakyStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "storage full").into());
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.inner.remove(key).await
    }
}
