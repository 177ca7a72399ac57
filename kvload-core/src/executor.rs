//! Executors performing a single store operation.
//!
//! Each executor starts its latency timer before generating the record, so the recorded
//! duration covers generation and the full store round-trip. The timer is stopped whatever the
//! outcome: failed operations are measured like successful ones.

use std::time::Duration;

use rand::Rng;

use crate::backend::{Store, StoreError};
use crate::keys::KeyGenerator;
use crate::latency::{LatencyRecorder, OperationKind};

/// The result of one executed operation.
#[derive(Debug)]
pub struct Outcome {
    /// The kind of operation that was executed.
    pub kind: OperationKind,
    /// The recorded duration.
    pub elapsed: Duration,
    /// The store error, if the operation failed.
    pub error: Option<StoreError>,
}

impl Outcome {
    /// Returns `true` if the store call succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Shared inputs of the executors.
#[derive(Clone, Debug)]
pub struct Executor {
    generator: KeyGenerator,
    recorder: LatencyRecorder,
    value_size: usize,
}

impl Executor {
    /// Creates an executor writing values of `value_size` bytes.
    pub fn new(generator: KeyGenerator, recorder: LatencyRecorder, value_size: usize) -> Self {
        Self {
            generator,
            recorder,
            value_size,
        }
    }

    /// Runs one operation of the given kind.
    pub async fn execute<R: Rng + Send>(
        &self,
        kind: OperationKind,
        store: &dyn Store,
        rng: &mut R,
    ) -> Outcome {
        match kind {
            OperationKind::Write => self.execute_write(store, rng).await,
            OperationKind::Read => self.execute_read(store, rng).await,
        }
    }

    /// Upserts a fresh value under a random key.
    pub async fn execute_write<R: Rng + Send>(&self, store: &dyn Store, rng: &mut R) -> Outcome {
        let timer = self.recorder.start(OperationKind::Write);

        let key = self.generator.next_key(rng);
        let value = self.generator.next_value(rng, self.value_size);
        let result = store.upsert(&key, value).await;

        let elapsed = timer.stop();
        let error = result.err();
        if let Some(ref error) = error {
            report_error(OperationKind::Write, &key, error);
        }

        Outcome {
            kind: OperationKind::Write,
            elapsed,
            error,
        }
    }

    /// Looks up a random key.
    pub async fn execute_read<R: Rng + Send>(&self, store: &dyn Store, rng: &mut R) -> Outcome {
        let timer = self.recorder.start(OperationKind::Read);

        let key = self.generator.next_key(rng);
        let result = store.get(&key).await;

        let elapsed = timer.stop();
        let error = match result {
            Ok(value) => {
                tracing::trace!(%key, hit = value.is_some(), "read completed");
                None
            }
            Err(error) => {
                report_error(OperationKind::Read, &key, &error);
                Some(error)
            }
        };

        Outcome {
            kind: OperationKind::Read,
            elapsed,
            error,
        }
    }
}

fn report_error(kind: OperationKind, key: &str, error: &StoreError) {
    tracing::warn!(
        error = error as &dyn std::error::Error,
        %kind,
        key,
        "store operation failed"
    );
    merni::counter!("store.error": 1, "kind" => kind.as_str());
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::backend::{InMemoryStore, StoreResult};
    use crate::latency::{LatencySink, LatencySummaries};

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait::async_trait]
    impl Store for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn upsert(&self, _key: &str, _value: Bytes) -> StoreResult<()> {
            Err(StoreError::generic("connection refused"))
        }

        async fn get(&self, _key: &str) -> StoreResult<Option<Bytes>> {
            Err(StoreError::generic("connection refused"))
        }
    }

    #[derive(Debug, Default)]
    struct CountingSink(AtomicUsize);

    impl LatencySink for CountingSink {
        fn observe(&self, _kind: OperationKind, _nanos: u64) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn executor(sink: Arc<dyn LatencySink>) -> Executor {
        let generator = KeyGenerator::new("memtier", 29_999);
        Executor::new(generator, LatencyRecorder::new(sink), 1024)
    }

    #[tokio::test]
    async fn write_stores_value_and_records() {
        let summaries = Arc::new(LatencySummaries::default());
        let executor = executor(summaries.clone());
        let store = InMemoryStore::new();
        let mut rng = SmallRng::seed_from_u64(1);

        let outcome = executor.execute_write(&store, &mut rng).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.kind, OperationKind::Write);

        assert_eq!(store.len(), 1);
        assert_eq!(summaries.get(OperationKind::Write).snapshot().count, 1);
        assert_eq!(summaries.get(OperationKind::Read).snapshot().count, 0);
    }

    #[tokio::test]
    async fn written_value_has_configured_size() {
        let summaries = Arc::new(LatencySummaries::default());
        let executor = executor(summaries);
        let store = InMemoryStore::new();

        // The key is drawn first, so a fresh generator with the same seed yields it again.
        executor
            .execute_write(&store, &mut SmallRng::seed_from_u64(9))
            .await;
        let key = KeyGenerator::new("memtier", 29_999).next_key(&mut SmallRng::seed_from_u64(9));

        let value = store.get_stored(&key).unwrap();
        assert_eq!(value.len(), 1024);
    }

    #[tokio::test]
    async fn read_records_miss_and_hit() {
        let summaries = Arc::new(LatencySummaries::default());
        let executor = executor(summaries.clone());
        let store = InMemoryStore::new();

        let outcome = executor
            .execute_read(&store, &mut SmallRng::seed_from_u64(4))
            .await;
        assert!(outcome.is_ok());

        executor
            .execute_write(&store, &mut SmallRng::seed_from_u64(4))
            .await;
        let outcome = executor
            .execute_read(&store, &mut SmallRng::seed_from_u64(4))
            .await;
        assert!(outcome.is_ok());

        assert_eq!(summaries.get(OperationKind::Read).snapshot().count, 2);
    }

    #[tokio::test]
    async fn failures_are_recorded() {
        let sink = Arc::new(CountingSink::default());
        let executor = executor(sink.clone());
        let mut rng = SmallRng::seed_from_u64(2);

        let write = executor
            .execute(OperationKind::Write, &BrokenStore, &mut rng)
            .await;
        let read = executor
            .execute(OperationKind::Read, &BrokenStore, &mut rng)
            .await;

        assert!(matches!(write.error, Some(StoreError::Generic { .. })));
        assert!(matches!(read.error, Some(StoreError::Generic { .. })));
        assert_eq!(sink.0.load(Ordering::Relaxed), 2);
    }
}
