use std::net::SocketAddr;

use anyhow::Result;
use axum::http::{HeaderValue, header};
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use crate::endpoints;
use crate::state::ServiceState;

/// The value for the `Server` HTTP header.
const SERVER: &str = concat!("kvload/", env!("CARGO_PKG_VERSION"));

/// The metrics web server application.
///
/// It serves `/metrics` and `/health` next to a running workload. Scrapes only read the
/// latency summaries and never block the dispatch loop.
#[derive(Debug)]
pub struct App {
    router: axum::Router,
    shutdown: Option<CancellationToken>,
}

impl App {
    /// Creates the application router for the given state.
    pub fn new(state: ServiceState) -> Self {
        // Layers added first are called first on requests and last on responses.
        let middleware = ServiceBuilder::new()
            .layer(CatchPanicLayer::new())
            .layer(SetResponseHeaderLayer::overriding(
                header::SERVER,
                HeaderValue::from_static(SERVER),
            ))
            .layer(NewSentryLayer::new_from_top())
            .layer(SentryHttpLayer::new())
            .layer(
                TraceLayer::new_for_http()
                    .on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
            );

        let router = endpoints::routes().layer(middleware).with_state(state);

        App {
            router,
            shutdown: None,
        }
    }

    /// Stops the server gracefully once `token` is cancelled.
    ///
    /// Without a token, the server runs until its future is dropped.
    pub fn graceful_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Runs the web server on `listener`.
    ///
    /// The returned future must be spawned or awaited for the server to make progress.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let Self { router, shutdown } = self;

        let service = router.into_make_service_with_connect_info::<SocketAddr>();

        match shutdown {
            Some(token) => {
                axum::serve(listener, service)
                    .with_graceful_shutdown(token.cancelled_owned())
                    .await?
            }
            None => axum::serve(listener, service).await?,
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
