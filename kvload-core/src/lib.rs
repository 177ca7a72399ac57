//! The dispatch engine of the `kvload` load generator.
//!
//! A [`Dispatcher`] pulls ticks from a fixed-rate [`RateLimiter`], asks the [`RatioScheduler`]
//! whether the next operation is a write or a read, and spawns the matching executor as an
//! independent task so that slow store round-trips never delay the next tick.
//!
//! Every operation records exactly one latency sample through the [`LatencyRecorder`], whether
//! the store call succeeded or not. Store errors are reported and counted but never stop the
//! loop.
//!
//! The engine is indifferent to the concrete key-value backend. It talks to a [`Store`] through
//! two calls, `upsert` and `get`. See the [`backend`] module for the implementations shipped
//! with this crate.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod inflight;
pub mod keys;
pub mod latency;
pub mod rate_limiter;
pub mod scheduler;

pub use backend::{Store, StoreError, StoreResult};
pub use config::WorkloadConfig;
pub use dispatch::{DispatchReport, Dispatcher};
pub use error::ConfigError;
pub use keys::KeyGenerator;
pub use latency::{LatencyRecorder, LatencySink, LatencySummaries, OperationKind};
pub use rate_limiter::RateLimiter;
pub use scheduler::RatioScheduler;
