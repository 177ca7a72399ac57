//! Blackbox tests for the metrics and health endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use kvload_core::{LatencySink, LatencySummaries, OperationKind};
use kvload_runner::config::Config;
use kvload_runner::healthcheck::healthcheck;
use kvload_runner::state::State;
use kvload_runner::web::{self, App};
use tokio_util::sync::CancellationToken;

struct Endpoint {
    addr: SocketAddr,
    token: CancellationToken,
    handle: tokio::task::JoinHandle<Result<()>>,
}

impl Endpoint {
    fn start(summaries: Arc<LatencySummaries>) -> Self {
        let listener = web::listen("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let token = CancellationToken::new();

        let app = App::new(State::new(summaries)).graceful_shutdown(token.clone());
        let handle = tokio::spawn(app.serve(listener));

        Self {
            addr,
            token,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    kvload_test::tracing::init();
    let endpoint = Endpoint::start(Arc::default());

    let response = reqwest::get(endpoint.url("/health")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("server"));
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[tokio::test]
async fn healthcheck_passes_against_endpoint() -> Result<()> {
    let endpoint = Endpoint::start(Arc::default());

    healthcheck(Config {
        http_addr: endpoint.addr,
        ..Default::default()
    })
    .await
}

#[tokio::test]
async fn metrics_expose_summaries() -> Result<()> {
    let summaries = Arc::new(LatencySummaries::default());
    summaries.observe(OperationKind::Write, 1_500);
    summaries.observe(OperationKind::Read, 700);
    summaries.observe(OperationKind::Read, 900);
    let endpoint = Endpoint::start(summaries.clone());

    let response = reqwest::get(endpoint.url("/metrics")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str()?.to_owned();
    assert!(content_type.starts_with("text/plain"), "{content_type}");

    let body = response.text().await?;
    assert!(body.contains("# HELP set_exec_time SET execution time summary"));
    assert!(body.contains("set_exec_time_count 1\n"));
    assert!(body.contains("get_exec_time_count 2\n"));
    assert!(body.contains("get_exec_time_sum 1600\n"));

    // Summaries are cumulative across scrapes.
    summaries.observe(OperationKind::Write, 2_500);
    let body = reqwest::get(endpoint.url("/metrics")).await?.text().await?;
    assert!(body.contains("set_exec_time_count 2\n"));
    assert!(body.contains("set_exec_time_sum 4000\n"));

    Ok(())
}

#[tokio::test]
async fn unknown_path_is_not_found() -> Result<()> {
    let endpoint = Endpoint::start(Arc::default());

    let response = reqwest::get(endpoint.url("/v1/objects")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn stops_on_cancellation() -> Result<()> {
    let endpoint = Endpoint::start(Arc::default());
    let url = endpoint.url("/health");

    endpoint.token.cancel();
    endpoint.handle.await??;

    assert!(reqwest::get(url).await.is_err());
    Ok(())
}
