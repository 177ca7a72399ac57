use std::sync::Arc;

use anyhow::{Context, Result};
use kvload_core::{LatencySummaries, Store};
use kvload_core::backend::{HttpStore, HttpStoreConfig, InMemoryStore, LocalFsStore, SharedStore};

use crate::config::Storage;

/// Key looked up once at startup to verify the store is reachable.
const PROBE_KEY: &str = "kvload-probe";

/// Shared reference to the [endpoint state](State).
pub type ServiceState = Arc<State>;

/// State shared with all HTTP request handlers.
///
/// In request handlers, use `axum::extract::State<ServiceState>` to retrieve a shared reference to
/// this structure.
#[derive(Debug)]
pub struct State {
    /// Latency summaries the dispatcher records into.
    pub summaries: Arc<LatencySummaries>,
}

impl State {
    pub fn new(summaries: Arc<LatencySummaries>) -> ServiceState {
        Arc::new(Self { summaries })
    }
}

/// Creates the configured store and verifies that it answers.
///
/// Any failure here is fatal: the workload must not start against an unusable store.
pub async fn connect(config: &Storage) -> Result<SharedStore> {
    let store: SharedStore = match config {
        Storage::Memory => Arc::new(InMemoryStore::new()),
        Storage::FileSystem { path } => Arc::new(
            LocalFsStore::open(path)
                .await
                .with_context(|| format!("failed to open store at {}", path.display()))?,
        ),
        Storage::Http {
            endpoint,
            timeout,
            pool_max_idle_per_host,
        } => Arc::new(
            HttpStore::new(HttpStoreConfig {
                endpoint: endpoint.clone(),
                request_timeout: *timeout,
                pool_max_idle_per_host: *pool_max_idle_per_host,
            })
            .context("failed to create http store")?,
        ),
    };

    store
        .get(PROBE_KEY)
        .await
        .with_context(|| format!("{} store is not reachable", store.name()))?;

    tracing::info!(store = store.name(), "connected to store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_memory() {
        let store = connect(&Storage::Memory).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn connects_filesystem() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("data");

        let store = connect(&Storage::FileSystem { path: path.clone() })
            .await
            .unwrap();
        assert_eq!(store.name(), "filesystem");
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn unreachable_http_store_fails() {
        let storage = Storage::Http {
            endpoint: "http://127.0.0.1:1".into(),
            timeout: Some(std::time::Duration::from_secs(1)),
            pool_max_idle_per_host: None,
        };

        let error = connect(&storage).await.unwrap_err();
        assert!(error.to_string().contains("not reachable"), "{error:#}");
    }
}
