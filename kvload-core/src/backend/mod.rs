//! Key-value store clients the dispatcher can drive.
//!
//! The dispatcher only needs the two calls of the [`Store`] trait. Connection management,
//! pooling and wire protocols are the concern of each implementation:
//!
//! - [`InMemoryStore`]: a process-local map, for dry runs and tests.
//! - [`LocalFsStore`]: one file per key in a directory.
//! - [`HttpStore`]: a key-value HTTP API, values addressed as `{endpoint}/{key}`.

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

mod http;
mod in_memory;
mod local_fs;

pub use http::{HttpStore, HttpStoreConfig};
pub use in_memory::InMemoryStore;
pub use local_fs::LocalFsStore;

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("kvload/", env!("CARGO_PKG_VERSION"));

/// A shared, type-erased [`Store`] instance.
pub type SharedStore = Arc<dyn Store>;

/// A client for a remote key-value store.
///
/// Both calls may be issued concurrently from many tasks. Each call must eventually complete
/// with a value or a [`StoreError`].
#[async_trait::async_trait]
pub trait Store: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Inserts or overwrites the value stored under `key`.
    async fn upsert(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// Looks up the value stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;
}

/// Errors returned by [`Store`] operations.
///
/// These are never fatal to the dispatcher. They are logged and counted where they occur.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO errors related to file operations.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors sending a request or receiving its response.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// What the store was doing.
        context: String,
        /// The underlying client error.
        #[source]
        cause: reqwest::Error,
    },

    /// The remote answered with an unexpected status code.
    #[error("unexpected status {status}: {context}")]
    Status {
        /// What the store was doing.
        context: String,
        /// The HTTP status code returned by the remote.
        status: u16,
    },

    /// Any other error stemming from one of the stores.
    #[error("store error: {context}")]
    Generic {
        /// What the store was doing.
        context: String,
        /// The underlying error, if any.
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Creates a [`StoreError::Generic`] without a cause.
    pub fn generic(context: impl Into<String>) -> Self {
        Self::Generic {
            context: context.into(),
            cause: None,
        }
    }

    pub(crate) fn reqwest(context: impl Into<String>, cause: reqwest::Error) -> Self {
        Self::Reqwest {
            context: context.into(),
            cause,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
