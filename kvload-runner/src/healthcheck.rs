//! Probe of the health endpoint of a running workload.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use kvload_core::backend::USER_AGENT;

use crate::config::Config;

/// Time allowed for the health endpoint to answer.
const TIMEOUT: Duration = Duration::from_secs(5);

/// Fails unless the endpoint at the configured address answers `/health` successfully.
pub async fn healthcheck(config: Config) -> Result<()> {
    let url = health_url(config.http_addr);
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(TIMEOUT)
        .build()?;

    tracing::debug!(%url, "probing health endpoint");
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("no answer from {url}"))?;

    let status = response.status();
    anyhow::ensure!(status.is_success(), "health endpoint answered {status}");

    tracing::info!("OK");
    Ok(())
}

/// Builds the URL of the health endpoint. A wildcard bind address is probed on loopback.
fn health_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}/health", SocketAddr::new(ip, addr.port()))
}
