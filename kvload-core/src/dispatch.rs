//! The dispatch loop.
//!
//! [`Dispatcher::run`] waits for ticks from the [`RateLimiter`] and, for every tick, picks the
//! next operation kind from the [`RatioScheduler`] and spawns the executor as its own task. The
//! tick wait is the only place the loop suspends, so slow operations pile up as concurrent tasks
//! instead of lowering the issuance rate.
//!
//! The loop stops when its [`CancellationToken`] is cancelled or the configured duration has
//! elapsed. It then waits for the operations still in flight and returns a [`DispatchReport`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::SharedStore;
use crate::config::WorkloadConfig;
use crate::error::ConfigError;
use crate::executor::Executor;
use crate::inflight::InFlightLimiter;
use crate::keys::KeyGenerator;
use crate::latency::{LatencyRecorder, OperationKind};
use crate::rate_limiter::{self, RateLimiter};
use crate::scheduler::RatioScheduler;

/// Live counters of a running dispatcher.
///
/// Shared with every spawned operation, and readable from outside while the loop runs.
#[derive(Debug, Default)]
pub struct DispatchStats {
    ticks: AtomicU64,
    rejected: AtomicU64,
    writes: AtomicU64,
    reads: AtomicU64,
    write_failures: AtomicU64,
    read_failures: AtomicU64,
}

impl DispatchStats {
    /// Number of ticks consumed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Number of ticks dropped because the in-flight limit was reached.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Number of operations of `kind` dispatched so far.
    pub fn dispatched(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::Write => self.writes.load(Ordering::Relaxed),
            OperationKind::Read => self.reads.load(Ordering::Relaxed),
        }
    }

    /// Number of operations of `kind` that completed with a store error.
    pub fn failures(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::Write => self.write_failures.load(Ordering::Relaxed),
            OperationKind::Read => self.read_failures.load(Ordering::Relaxed),
        }
    }

    fn record_dispatch(&self, kind: OperationKind) {
        let counter = match kind {
            OperationKind::Write => &self.writes,
            OperationKind::Read => &self.reads,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, kind: OperationKind) {
        let counter = match kind {
            OperationKind::Write => &self.write_failures,
            OperationKind::Read => &self.read_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Totals of a finished dispatch run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Ticks consumed by the loop.
    pub ticks: u64,
    /// Ticks dropped because the in-flight limit was reached.
    pub rejected: u64,
    /// Writes dispatched.
    pub writes: u64,
    /// Reads dispatched.
    pub reads: u64,
    /// Writes that completed with a store error.
    pub write_failures: u64,
    /// Reads that completed with a store error.
    pub read_failures: u64,
    /// Highest number of operations in flight at once.
    pub peak_in_flight: usize,
    /// Time from the first tick until the last operation finished.
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Total number of dispatched operations.
    pub fn dispatched(&self) -> u64 {
        self.writes + self.reads
    }

    /// Number of dispatched operations of `kind`.
    pub fn count(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::Write => self.writes,
            OperationKind::Read => self.reads,
        }
    }

    /// Number of failed operations of `kind`.
    pub fn failures(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::Write => self.write_failures,
            OperationKind::Read => self.read_failures,
        }
    }

    fn from_stats(stats: &DispatchStats, peak_in_flight: usize, elapsed: Duration) -> Self {
        Self {
            ticks: stats.ticks(),
            rejected: stats.rejected(),
            writes: stats.dispatched(OperationKind::Write),
            reads: stats.dispatched(OperationKind::Read),
            write_failures: stats.failures(OperationKind::Write),
            read_failures: stats.failures(OperationKind::Read),
            peak_in_flight,
            elapsed,
        }
    }
}

/// Drives a workload against a store.
#[derive(Debug)]
pub struct Dispatcher {
    store: SharedStore,
    executor: Executor,
    scheduler: RatioScheduler,
    period: Duration,
    duration: Option<Duration>,
    inflight: InFlightLimiter,
    rng: SmallRng,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    /// Creates a dispatcher for the given workload.
    ///
    /// Fails if the workload parameters are invalid. No store call happens before [`run`].
    ///
    /// [`run`]: Self::run
    pub fn new(
        config: &WorkloadConfig,
        store: SharedStore,
        recorder: LatencyRecorder,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let generator = KeyGenerator::new(config.key_prefix.as_str(), config.keyspace);
        let seed = config.seed.unwrap_or_else(rand::random);
        tracing::debug!(seed, "seeding workload generator");

        Ok(Self {
            store,
            executor: Executor::new(generator, recorder, config.value_size),
            scheduler: RatioScheduler::new(config.writes, config.cycle)?,
            period: rate_limiter::period_for(config.rate)?,
            duration: config.duration,
            inflight: InFlightLimiter::new(config.max_in_flight),
            rng: SmallRng::seed_from_u64(seed),
            stats: Arc::default(),
        })
    }

    /// Returns the live counters of this dispatcher.
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Returns a handle counting operations in flight.
    pub fn in_flight(&self) -> InFlightLimiter {
        self.inflight.clone()
    }

    /// Runs the loop until `token` is cancelled or the configured duration elapses.
    ///
    /// Operations already dispatched are not cancelled. This waits for all of them to finish
    /// before returning the report.
    pub async fn run(mut self, token: CancellationToken) -> DispatchReport {
        tracing::info!(
            store = self.store.name(),
            period = ?self.period,
            "starting dispatch loop"
        );

        let start = Instant::now();
        let mut limiter = RateLimiter::with_period(self.period);

        let deadline = self.duration.map(|duration| start + duration);
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        let inflight = self.inflight.clone();
        let emitter = inflight.run_emitter(|count| async move {
            merni::gauge!("dispatch.in_flight": count);
        });
        tokio::pin!(emitter);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::info!("dispatch loop cancelled");
                    break;
                }
                _ = &mut expired => {
                    tracing::info!("workload duration elapsed");
                    break;
                }
                _ = &mut emitter => unreachable!("emitter runs forever"),
                _ = limiter.tick() => self.dispatch(),
            }
        }

        tracing::info!(in_flight = inflight.in_flight(), "waiting for in-flight operations");
        inflight.wait_all().await;

        let report = DispatchReport::from_stats(&self.stats, inflight.peak(), start.elapsed());
        tracing::info!(?report, "dispatch loop finished");
        report
    }

    /// Handles a single tick.
    fn dispatch(&mut self) {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let Some(permit) = self.inflight.try_acquire() else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            merni::counter!("dispatch.rejected": 1);
            tracing::debug!("in-flight limit reached, dropping tick");
            return;
        };

        let kind = self.scheduler.next_kind();
        let seed = self.rng.next_u64();
        self.stats.record_dispatch(kind);
        merni::counter!("dispatch.started": 1, "kind" => kind.as_str());

        let store = Arc::clone(&self.store);
        let executor = self.executor.clone();
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let mut rng = SmallRng::seed_from_u64(seed);
            let outcome = executor.execute(kind, store.as_ref(), &mut rng).await;
            if !outcome.is_ok() {
                stats.record_failure(kind);
            }
            drop(permit);
        });
    }
}
