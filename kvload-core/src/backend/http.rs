use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;

use super::{Store, StoreError, StoreResult, USER_AGENT};

/// Connection parameters for an [`HttpStore`].
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL that keys are appended to, for example `http://localhost:8888/kv/bucket1`.
    pub endpoint: String,
    /// Timeout for each request, including the response body.
    pub request_timeout: Option<Duration>,
    /// Maximum number of idle connections kept per host.
    pub pool_max_idle_per_host: Option<usize>,
}

/// A [`Store`] speaking a plain key-value HTTP API.
///
/// Values are written with `PUT {endpoint}/{key}` and read with `GET {endpoint}/{key}`, where a
/// `404` response means the key does not exist. The underlying client pools connections and is
/// safe to use from many tasks.
#[derive(Debug)]
pub struct HttpStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStore {
    /// Creates a store talking to the configured endpoint.
    pub fn new(config: HttpStoreConfig) -> StoreResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(max_idle) = config.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(max_idle);
        }

        let client = builder
            .build()
            .map_err(|cause| StoreError::reqwest("failed to build client", cause))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint, key)
    }
}

#[async_trait::async_trait]
impl Store for HttpStore {
    fn name(&self) -> &'static str {
        "http"
    }

    #[tracing::instrument(level = "trace", skip_all, fields(%key))]
    async fn upsert(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let response = self
            .client
            .put(self.url(key))
            .body(value)
            .send()
            .await
            .map_err(|cause| StoreError::reqwest("failed to send upsert request", cause))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                context: format!("upsert of `{key}`"),
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all, fields(%key))]
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let response = self
            .client
            .get(self.url(key))
            .send()
            .await
            .map_err(|cause| StoreError::reqwest("failed to send get request", cause))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::trace!("Key not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                context: format!("get of `{key}`"),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|cause| StoreError::reqwest("failed to read response body", cause))?;

        Ok(Some(body))
    }
}
