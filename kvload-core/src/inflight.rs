//! Tracking and limiting of in-flight operations.
//!
//! Every dispatched operation holds an [`InFlightPermit`] until it finishes. The permits come
//! from a tokio semaphore, which caps concurrency when a limit is configured and otherwise only
//! counts. Dropping a permit wakes [`InFlightLimiter::wait_all`], which the dispatcher uses to
//! drain outstanding operations on shutdown.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Interval for the periodic in-flight emitter.
pub const EMITTER_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Shared {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    peak: AtomicUsize,
    released: Notify,
}

impl Shared {
    fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

/// Counts in-flight operations and optionally caps them.
///
/// Clones share the same counters.
#[derive(Clone, Debug)]
pub struct InFlightLimiter {
    shared: Arc<Shared>,
}

impl InFlightLimiter {
    /// Creates a limiter admitting at most `max` operations at once.
    ///
    /// With `None`, every acquisition succeeds and the limiter only counts.
    pub fn new(max: Option<usize>) -> Self {
        let capacity = max.map_or(Semaphore::MAX_PERMITS, |max| {
            max.min(Semaphore::MAX_PERMITS)
        });

        Self {
            shared: Arc::new(Shared {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                peak: AtomicUsize::new(0),
                released: Notify::new(),
            }),
        }
    }

    /// Admits one more operation, or returns `None` when the limit is reached.
    pub fn try_acquire(&self) -> Option<InFlightPermit> {
        let permit = Arc::clone(&self.shared.semaphore)
            .try_acquire_owned()
            .ok()?;
        self.shared
            .peak
            .fetch_max(self.shared.in_flight(), Ordering::Relaxed);

        Some(InFlightPermit {
            permit: Some(permit),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Returns the number of operations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight()
    }

    /// Returns the highest number of operations that were in flight at once.
    pub fn peak(&self) -> usize {
        self.shared.peak.load(Ordering::Relaxed)
    }

    /// Resolves once no operation is in flight.
    pub async fn wait_all(&self) {
        loop {
            // Register interest before checking, so a release in between is not missed.
            let released = self.shared.released.notified();
            if self.in_flight() == 0 {
                return;
            }
            released.await;
        }
    }

    /// Calls `emit` with the in-flight count every [`EMITTER_INTERVAL`].
    ///
    /// Never completes. Race it against the dispatch loop.
    pub async fn run_emitter<F, Fut>(&self, mut emit: F)
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(EMITTER_INTERVAL);
        loop {
            ticker.tick().await;
            emit(self.in_flight()).await;
        }
    }
}

/// Marks one operation as in flight until dropped.
#[derive(Debug)]
pub struct InFlightPermit {
    permit: Option<OwnedSemaphorePermit>,
    shared: Arc<Shared>,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        // The permit must be returned before waking waiters, or they would still count it.
        drop(self.permit.take());
        self.shared.released.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;

    #[test]
    fn counts_operations() {
        let limiter = InFlightLimiter::new(Some(3));
        let first = limiter.try_acquire().unwrap();
        let second = limiter.try_acquire().unwrap();
        assert_eq!(limiter.in_flight(), 2);

        drop(first);
        assert_eq!(limiter.in_flight(), 1);
        drop(second);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn rejects_above_limit() {
        let limiter = InFlightLimiter::new(Some(1));
        let permit = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.in_flight(), 1);

        drop(permit);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn unbounded_admits_everything() {
        let limiter = InFlightLimiter::new(None);
        let permits: Vec<_> = (0..10_000).map(|_| limiter.try_acquire().unwrap()).collect();
        assert_eq!(limiter.in_flight(), 10_000);

        drop(permits);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn peak_is_a_high_water_mark() {
        let limiter = InFlightLimiter::new(None);
        let permits: Vec<_> = (0..5).map(|_| limiter.try_acquire().unwrap()).collect();
        drop(permits);

        let _permit = limiter.try_acquire().unwrap();
        assert_eq!(limiter.in_flight(), 1);
        assert_eq!(limiter.peak(), 5);
    }

    #[test]
    fn clones_share_counters() {
        let limiter = InFlightLimiter::new(Some(2));
        let clone = limiter.clone();

        let _permit = clone.try_acquire().unwrap();
        assert_eq!(limiter.in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn emitter_reports_count() {
        let limiter = InFlightLimiter::new(Some(5));
        let _first = limiter.try_acquire().unwrap();
        let _second = limiter.try_acquire().unwrap();

        let last = Arc::new(AtomicU64::new(u64::MAX));
        let emitter = limiter.run_emitter(|count| {
            let last = Arc::clone(&last);
            async move { last.store(count as u64, Ordering::Relaxed) }
        });

        tokio::select! {
            _ = emitter => unreachable!("emitter runs forever"),
            _ = tokio::time::sleep(EMITTER_INTERVAL / 2) => {}
        }

        assert_eq!(last.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn wait_all_waits_for_last_release() {
        let limiter = InFlightLimiter::new(None);
        let first = limiter.try_acquire().unwrap();
        let second = limiter.try_acquire().unwrap();

        let mut wait = Box::pin(limiter.wait_all());

        drop(first);
        assert!(futures::poll!(&mut wait).is_pending());

        drop(second);
        assert!(futures::poll!(&mut wait).is_ready());
    }

    #[tokio::test]
    async fn wait_all_is_ready_when_idle() {
        let limiter = InFlightLimiter::new(Some(5));
        assert!(futures::poll!(Box::pin(limiter.wait_all())).is_ready());
    }

    #[tokio::test]
    async fn wait_all_wakes_from_other_task() {
        let limiter = InFlightLimiter::new(None);
        let permit = limiter.try_acquire().unwrap();

        tokio::spawn(async move {
            tokio::task::yield_now().await;
            drop(permit);
        });

        limiter.wait_all().await;
        assert_eq!(limiter.in_flight(), 0);
    }
}
