//! Configuration for the kvload runner.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `KVLOAD__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `KVLOAD__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `KVLOAD__HTTP_ADDR=0.0.0.0:9090` sets the metrics endpoint address
//! - `KVLOAD__STORE__TYPE=http` selects the store backend
//! - `KVLOAD__STORE__ENDPOINT=http://kv:8888/bucket1` sets the endpoint of the store
//! - `KVLOAD__WORKLOAD__RATE=1000` sets the target operation rate
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! http_addr: 0.0.0.0:9090
//!
//! store:
//!   type: http
//!   endpoint: http://kv:8888/bucket1
//!
//! workload:
//!   rate: 1000
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use kvload_core::WorkloadConfig;
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "KVLOAD__";

/// A credential read from the configuration, such as the Sentry DSN or the Datadog key.
///
/// Always wrapped in a [`SecretBox`], and printed as `[redacted]`.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the plain credential.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConfigSecret {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Store backend configuration.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is used.
///
/// Used in: [`Config::store`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// Process-local store (type `"memory"`).
    ///
    /// Nothing leaves the process. Useful for dry runs that only exercise the dispatcher.
    Memory,

    /// Local filesystem store (type `"filesystem"`).
    ///
    /// Stores each key as one file in a directory.
    ///
    /// # Example
    ///
    /// ```yaml
    /// store:
    ///   type: filesystem
    ///   path: /data
    /// ```
    FileSystem {
        /// Directory path for storing values.
        ///
        /// The directory will be created if it doesn't exist.
        ///
        /// # Environment Variables
        ///
        /// - `KVLOAD__STORE__TYPE=filesystem`
        /// - `KVLOAD__STORE__PATH=/path/to/storage`
        path: PathBuf,
    },

    /// Key-value HTTP API (type `"http"`).
    ///
    /// Values are written with `PUT {endpoint}/{key}` and read with `GET {endpoint}/{key}`.
    ///
    /// # Example
    ///
    /// ```yaml
    /// store:
    ///   type: http
    ///   endpoint: http://localhost:8888/kv/bucket1
    ///   timeout: 5s
    /// ```
    Http {
        /// Base URL that keys are appended to.
        ///
        /// # Environment Variables
        ///
        /// - `KVLOAD__STORE__TYPE=http`
        /// - `KVLOAD__STORE__ENDPOINT=http://localhost:8888/kv/bucket1`
        endpoint: String,

        /// Timeout for each request, including the response body.
        ///
        /// # Default
        ///
        /// `None` (no timeout)
        #[serde(default, with = "humantime_serde")]
        timeout: Option<Duration>,

        /// Maximum number of idle connections kept per host.
        ///
        /// # Default
        ///
        /// `None` (unbounded)
        #[serde(default)]
        pool_max_idle_per_host: Option<usize>,
    },
}

/// Sizing of the tokio runtime that hosts the dispatcher and the endpoint.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Worker threads of the runtime, `num_cpus` when omitted.
    ///
    /// Dispatched operations run as tasks on this pool, so it bounds how many of them make
    /// progress in parallel. The dispatch loop itself occupies one task.
    ///
    /// `KVLOAD__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        let worker_threads = num_cpus::get();
        Runtime { worker_threads }
    }
}

/// Error reporting to [Sentry](https://sentry.io/).
///
/// Stays off unless a DSN is configured.
///
/// Used in: [`Config::sentry`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Sentry {
    /// DSN of the project that receives events (`KVLOAD__SENTRY__DSN`).
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Name of the environment the load generator runs in (`KVLOAD__SENTRY__ENVIRONMENT`).
    pub environment: Option<Cow<'static, str>>,

    /// Share of error events sent, `1.0` by default (`KVLOAD__SENTRY__SAMPLE_RATE`).
    pub sample_rate: f32,

    /// Share of traces sent, `0.01` by default (`KVLOAD__SENTRY__TRACES_SAMPLE_RATE`).
    ///
    /// Operations are not traced individually, so this mostly covers endpoint requests.
    pub traces_sample_rate: f32,

    /// Turns on debug output of the SDK itself (`KVLOAD__SENTRY__DEBUG`).
    pub debug: bool,

    /// Tags added to every event, one variable per tag: `KVLOAD__SENTRY__TAGS__REGION=eu`.
    pub tags: BTreeMap<String, String>,
}

impl Sentry {
    /// Whether a DSN has been configured.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Sentry {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.01,
            debug: false,
            tags: Default::default(),
        }
    }
}

/// How log lines are rendered on stderr.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// [`LogFormat::Pretty`] on a terminal, [`LogFormat::Simplified`] everywhere else.
    Auto,

    /// Multi-line colored output for interactive use.
    Pretty,

    /// One plain line per event.
    ///
    /// ```text
    /// 2025-03-04T12:10:32Z  INFO kvload_core::dispatch: starting dispatch loop
    /// ```
    Simplified,

    /// One JSON object per event.
    Json,
}

/// Serde adapter for [`LevelFilter`], which is spelled like `RUST_LOG` levels.
mod level_filter {
    use std::borrow::Cow;

    use serde::{Deserialize, Deserializer, Serializer, de};
    use tracing::level_filters::LevelFilter;

    pub fn serialize<S: Serializer>(level: &LevelFilter, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(level)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LevelFilter, D::Error> {
        let level = Cow::<'de, str>::deserialize(deserializer)?;
        level.parse().map_err(de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs always go to stderr, so they never mix with the final run report on stdout.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Least severe level that is printed, `info` by default (`KVLOAD__LOGGING__LEVEL`).
    ///
    /// `RUST_LOG` takes precedence and may also hold a full filter directive. At `debug`, every
    /// tick dropped by the in-flight limit is logged.
    #[serde(with = "level_filter")]
    pub level: LevelFilter,

    /// Rendering of log lines, `auto` by default (`KVLOAD__LOGGING__FORMAT`).
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Submission of the runner's own metrics to Datadog.
///
/// Independent of the latency summaries on `/metrics`, which are always served.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Metrics {
    /// Datadog API key (`KVLOAD__METRICS__DATADOG_KEY`). Nothing is submitted without one.
    pub datadog_key: Option<SecretBox<ConfigSecret>>,

    /// Tags added to every metric, one variable per tag: `KVLOAD__METRICS__TAGS__REGION=eu`.
    pub tags: BTreeMap<String, String>,
}

/// Main configuration struct for the kvload runner.
///
/// See individual field documentation for details on each configuration option, including
/// defaults and environment variables.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Bind address of the metrics and health endpoint.
    ///
    /// # Default
    ///
    /// `0.0.0.0:8080`
    ///
    /// # Environment Variable
    ///
    /// `KVLOAD__HTTP_ADDR`
    pub http_addr: SocketAddr,

    /// The store the workload runs against.
    ///
    /// # Default
    ///
    /// [`Storage::Memory`]
    ///
    /// # Environment Variables
    ///
    /// - `KVLOAD__STORE__TYPE` for the backend type. See [`Storage`] for available options.
    pub store: Storage,

    /// Rate, read/write mix and record shape of the generated load.
    ///
    /// # Environment Variables
    ///
    /// - `KVLOAD__WORKLOAD__RATE`
    /// - `KVLOAD__WORKLOAD__WRITES`
    /// - `KVLOAD__WORKLOAD__CYCLE`
    /// - `KVLOAD__WORKLOAD__KEYSPACE`
    /// - `KVLOAD__WORKLOAD__VALUE_SIZE`
    /// - `KVLOAD__WORKLOAD__KEY_PREFIX`
    /// - `KVLOAD__WORKLOAD__MAX_IN_FLIGHT`
    /// - `KVLOAD__WORKLOAD__SEED`
    /// - `KVLOAD__WORKLOAD__DURATION`, for example `30s` or `5m`
    pub workload: WorkloadConfig,

    /// Configuration of the internal task runtime.
    pub runtime: Runtime,

    /// Logging configuration.
    pub logging: Logging,

    /// Sentry error tracking configuration.
    pub sentry: Sentry,

    /// Internal metrics configuration.
    pub metrics: Metrics,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            store: Storage::Memory,
            workload: WorkloadConfig::default(),
            runtime: Runtime::default(),
            logging: Logging::default(),
            sentry: Sentry::default(),
            metrics: Metrics::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `KVLOAD__`)
    ///
    /// The workload section is only parsed here. Its parameters are validated when the
    /// dispatcher is created.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Figment::from(Serialized::defaults(Config::default()));
        let figment = match path {
            Some(path) => defaults.merge(Yaml::file(path)),
            None => defaults,
        };

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?)
    }
}
