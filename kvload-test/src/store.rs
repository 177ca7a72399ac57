//! [`Store`] doubles for driving the dispatcher in tests.
//!
//! All doubles are [`Clone`] and share their state between clones, so a test can keep a handle
//! while the dispatcher owns another.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use kvload_core::backend::InMemoryStore;
use kvload_core::{OperationKind, Store, StoreError, StoreResult};

/// A store that records every call in the order it was received.
///
/// Values are kept in an [`InMemoryStore`], so reads observe earlier writes.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    calls: Arc<Mutex<Vec<(OperationKind, String)>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all calls received so far.
    pub fn calls(&self) -> Vec<(OperationKind, String)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the kinds of all calls received so far.
    pub fn kinds(&self) -> Vec<OperationKind> {
        self.calls().into_iter().map(|(kind, _)| kind).collect()
    }

    /// Returns the backing store.
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    fn record(&self, kind: OperationKind, key: &str) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((kind, key.to_owned()));
    }
}

#[async_trait::async_trait]
impl Store for RecordingStore {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn upsert(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.record(OperationKind::Write, key);
        self.inner.upsert(key, value).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.record(OperationKind::Read, key);
        self.inner.get(key).await
    }
}

/// A store that fails every call.
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    calls: Arc<Mutex<u64>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of calls received so far.
    pub fn calls(&self) -> u64 {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self) -> StoreError {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        StoreError::generic("simulated outage")
    }
}

#[async_trait::async_trait]
impl Store for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn upsert(&self, _key: &str, _value: Bytes) -> StoreResult<()> {
        Err(self.fail())
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Bytes>> {
        Err(self.fail())
    }
}

/// A store that sleeps before answering each call.
///
/// Combine with paused tokio time to hold operations in flight for a precise duration.
#[derive(Debug, Clone)]
pub struct SlowStore {
    inner: InMemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryStore::new(),
            delay,
        }
    }

    /// Returns the backing store.
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait::async_trait]
impl Store for SlowStore {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn upsert(&self, key: &str, value: Bytes) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.upsert(key, value).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }
}
