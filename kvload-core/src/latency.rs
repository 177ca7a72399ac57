//! Per-operation latency instrumentation.
//!
//! A [`LatencyRecorder`] hands out [`LatencyTimer`]s. Each timer records exactly one sample into
//! a [`LatencySink`] when it is stopped or dropped, whichever comes first.
//!
//! [`LatencySummaries`] is the sink used by the binary. It keeps one [`DDSketch`] per
//! [`OperationKind`] and answers quantile queries for exporters without retaining individual
//! samples.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use sketches_ddsketch::{Config, DDSketch};

/// Smallest value tracked with full accuracy, in nanoseconds.
const SKETCH_MIN_VALUE: f64 = 1.0;
/// Upper bound on the number of sketch bins.
///
/// At the tightest default accuracy this covers 1ns to well over a day.
const SKETCH_MAX_BINS: u32 = 16_384;

/// The kind of a dispatched operation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperationKind {
    /// An upsert of a freshly generated value.
    Write,
    /// A point lookup of a key.
    Read,
}

impl OperationKind {
    /// All operation kinds, writes first.
    pub const ALL: [OperationKind; 2] = [OperationKind::Write, OperationKind::Read];

    /// Returns the lowercase name of this kind, used in logs and metric tags.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Write => "write",
            OperationKind::Read => "read",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives latency observations.
///
/// Implementations must accept observations from many tasks at once and must never block for
/// longer than an in-memory update.
pub trait LatencySink: fmt::Debug + Send + Sync + 'static {
    /// Records one operation of `kind` that took `nanos` nanoseconds.
    fn observe(&self, kind: OperationKind, nanos: u64);
}

/// A target quantile together with the acceptable estimation error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Objective {
    /// The quantile, in `[0, 1]`.
    pub quantile: f64,
    /// Acceptable error of the estimate.
    pub error: f64,
}

impl Objective {
    /// Creates a new objective.
    pub const fn new(quantile: f64, error: f64) -> Self {
        Self { quantile, error }
    }
}

/// The quantiles reported for every summary.
pub const DEFAULT_OBJECTIVES: [Objective; 3] = [
    Objective::new(0.5, 0.05),
    Objective::new(0.9, 0.01),
    Objective::new(0.99, 0.001),
];

/// A mergeable quantile summary of operation durations in nanoseconds.
pub struct LatencySummary {
    sketch: Mutex<DDSketch>,
    objectives: Arc<[Objective]>,
}

impl LatencySummary {
    /// Creates an empty summary reporting the given objectives.
    ///
    /// The sketch is sized for the tightest error among the objectives.
    pub fn new(objectives: impl Into<Arc<[Objective]>>) -> Self {
        let objectives = objectives.into();
        let accuracy = objectives
            .iter()
            .map(|o| o.error)
            .filter(|e| *e > 0.0)
            .fold(0.01, f64::min);

        let config = Config::new(accuracy, SKETCH_MAX_BINS, SKETCH_MIN_VALUE);
        Self {
            sketch: Mutex::new(DDSketch::new(config)),
            objectives,
        }
    }

    /// Adds one observation.
    pub fn observe(&self, nanos: u64) {
        self.lock().add(nanos as f64);
    }

    /// Returns a copy of the underlying sketch, for merging into other summaries.
    pub fn sketch(&self) -> DDSketch {
        self.lock().clone()
    }

    /// Computes the current count, sum and objective quantiles.
    pub fn snapshot(&self) -> SummarySnapshot {
        SummarySnapshot::new(&self.lock(), &self.objectives)
    }

    // Recording must never panic, so a poisoned lock is taken over as is.
    fn lock(&self) -> MutexGuard<'_, DDSketch> {
        self.sketch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LatencySummary {
    fn default() -> Self {
        Self::new(DEFAULT_OBJECTIVES)
    }
}

impl fmt::Debug for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencySummary")
            .field("count", &self.lock().count())
            .field("objectives", &self.objectives)
            .finish()
    }
}

/// Point-in-time view of a [`LatencySummary`].
#[derive(Clone, Debug, PartialEq)]
pub struct SummarySnapshot {
    /// Number of observations.
    pub count: usize,
    /// Sum of all observed values, in nanoseconds.
    pub sum: f64,
    /// Estimated value for every objective, `None` while the summary is empty.
    pub quantiles: Vec<(Objective, Option<f64>)>,
}

impl SummarySnapshot {
    /// Reads count, sum and the given objectives from a sketch.
    pub fn new(sketch: &DDSketch, objectives: &[Objective]) -> Self {
        let quantiles = objectives
            .iter()
            .map(|o| (*o, sketch.quantile(o.quantile).ok().flatten()))
            .collect();

        Self {
            count: sketch.count(),
            sum: sketch.sum().unwrap_or(0.0),
            quantiles,
        }
    }

    /// Returns the estimate for the given quantile, if it is one of the objectives.
    pub fn quantile(&self, quantile: f64) -> Option<f64> {
        self.quantiles
            .iter()
            .find(|(o, _)| o.quantile == quantile)
            .and_then(|(_, value)| *value)
    }

    /// Average observed value in nanoseconds, `None` while empty.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// One [`LatencySummary`] per [`OperationKind`].
///
/// Created once at startup and never reset, so exporters always see cumulative values.
#[derive(Debug, Default)]
pub struct LatencySummaries {
    write: LatencySummary,
    read: LatencySummary,
}

impl LatencySummaries {
    /// Creates summaries reporting the given objectives.
    pub fn new(objectives: &[Objective]) -> Self {
        Self {
            write: LatencySummary::new(objectives),
            read: LatencySummary::new(objectives),
        }
    }

    /// Returns the summary for one operation kind.
    pub fn get(&self, kind: OperationKind) -> &LatencySummary {
        match kind {
            OperationKind::Write => &self.write,
            OperationKind::Read => &self.read,
        }
    }
}

impl LatencySink for LatencySummaries {
    fn observe(&self, kind: OperationKind, nanos: u64) {
        self.get(kind).observe(nanos);
    }
}

/// Starts latency timers and forwards their results to a [`LatencySink`].
#[derive(Clone, Debug)]
pub struct LatencyRecorder {
    sink: Arc<dyn LatencySink>,
}

impl LatencyRecorder {
    /// Creates a recorder that feeds the given sink.
    pub fn new(sink: Arc<dyn LatencySink>) -> Self {
        Self { sink }
    }

    /// Captures the current time and returns a timer for one operation of `kind`.
    pub fn start(&self, kind: OperationKind) -> LatencyTimer {
        LatencyTimer {
            recorder: self.clone(),
            kind,
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Records an already measured duration.
    pub fn observe(&self, kind: OperationKind, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.sink.observe(kind, nanos);
        merni::distribution!("op.latency"@s: elapsed, "kind" => kind.as_str());
    }
}

/// Measures a single operation.
///
/// The sample is recorded by [`stop`](Self::stop), or on drop if the timer was never stopped. A
/// timer records at most once.
#[must_use = "dropping the timer immediately records a zero-length operation"]
pub struct LatencyTimer {
    recorder: LatencyRecorder,
    kind: OperationKind,
    start: Instant,
    recorded: bool,
}

impl LatencyTimer {
    /// The kind this timer records into.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Stops the timer, records the elapsed time and returns it.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if !self.recorded {
            self.recorded = true;
            self.recorder.observe(self.kind, elapsed);
        }
        elapsed
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        self.record();
    }
}

impl fmt::Debug for LatencyTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyTimer")
            .field("kind", &self.kind)
            .field("start", &self.start)
            .field("recorded", &self.recorded)
            .finish()
    }
}
