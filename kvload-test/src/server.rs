//! Exposes an in-process key-value HTTP server for use in integration tests.
//!
//! The server speaks the protocol expected by [`HttpStore`](kvload_core::backend::HttpStore):
//! `PUT /{key}` stores the request body and `GET /{key}` returns it, or `404` if unknown.
//!
//! ```
//! use kvload_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = TestServer::new().await;
//!     let endpoint = server.url("/");
//!     // point an HttpStore at `endpoint`...
//! }
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use kvload_core::Store;
use kvload_core::backend::InMemoryStore;
use tokio::net::TcpListener;

/// An in-process key-value server for use in integration tests.
///
/// Values are held in an [`InMemoryStore`] that stays inspectable through [`store`](Self::store).
/// The server listens on a random available port on localhost and stops when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    store: InMemoryStore,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_routes(Router::new()).await
    }

    /// Starts the server with additional routes merged in front of the key-value routes.
    ///
    /// Use this to simulate misbehaving endpoints, for example a path answering `500`.
    pub async fn with_routes(extra: Router) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let socket = listener.local_addr().unwrap();

        let store = InMemoryStore::new();
        let app = extra.merge(
            Router::new()
                .route("/{key}", get(get_value).put(put_value))
                .with_state(store.clone()),
        );

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            store,
        }
    }

    /// Returns the URL of `path` on this server, for example the endpoint of an `HttpStore`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.socket, path.trim_start_matches('/'))
    }

    /// Returns the store holding all values written to this server.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn put_value(
    State(store): State<InMemoryStore>,
    Path(key): Path<String>,
    body: Bytes,
) -> Response {
    match store.upsert(&key, body).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn get_value(State(store): State<InMemoryStore>, Path(key): Path<String>) -> Response {
    match store.get(&key).await {
        Ok(Some(value)) => value.into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
