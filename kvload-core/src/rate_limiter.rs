//! Fixed-rate tick source that paces the dispatcher.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::ConfigError;

/// Highest supported rate, one tick per nanosecond.
pub const MAX_RATE: u32 = 1_000_000_000;

/// Returns the tick period for `rate` operations per second.
pub fn period_for(rate: u32) -> Result<Duration, ConfigError> {
    match rate {
        0 => Err(ConfigError::ZeroRate),
        rate if rate > MAX_RATE => Err(ConfigError::RateTooHigh {
            rate,
            max: MAX_RATE,
        }),
        rate => Ok(Duration::from_secs(1) / rate),
    }
}

/// Emits one tick every `1s / rate`.
///
/// Ticks are scheduled at fixed offsets from the start, so the number of ticks over any window
/// never exceeds the window divided by the period, plus one. The timer driver has millisecond
/// granularity; at higher rates several ticks become due per timer wake-up and are delivered
/// back to back, which keeps the long-run rate at the target.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Interval,
    period: Duration,
}

impl RateLimiter {
    /// Creates a limiter emitting `rate` ticks per second. The first tick is immediate.
    pub fn per_second(rate: u32) -> Result<Self, ConfigError> {
        Ok(Self::with_period(period_for(rate)?))
    }

    /// Creates a limiter emitting one tick per `period`.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn with_period(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        Self { interval, period }
    }

    /// The time between two ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Waits for the next tick and returns the instant it was scheduled for.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_period() {
        let limiter = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(async { RateLimiter::per_second(40_000).unwrap() });
        assert_eq!(limiter.period(), Duration::from_micros(25));
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert_eq!(
            RateLimiter::per_second(0).map(|_| ()),
            Err(ConfigError::ZeroRate)
        );
    }

    #[tokio::test]
    async fn rate_above_nanosecond_resolution_is_rejected() {
        assert_eq!(
            RateLimiter::per_second(MAX_RATE + 1).map(|_| ()),
            Err(ConfigError::RateTooHigh {
                rate: MAX_RATE + 1,
                max: MAX_RATE
            })
        );
        assert_eq!(
            RateLimiter::per_second(u32::MAX).map(|_| ()),
            Err(ConfigError::RateTooHigh {
                rate: u32::MAX,
                max: MAX_RATE
            })
        );

        let limiter = RateLimiter::per_second(MAX_RATE).unwrap();
        assert_eq!(limiter.period(), Duration::from_nanos(1));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_periodic() {
        let mut limiter = RateLimiter::per_second(100).unwrap();
        let start = limiter.tick().await;

        for i in 1..=50u32 {
            let at = limiter.tick().await;
            assert_eq!(at - start, Duration::from_millis(10) * i);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tick_count_is_bounded_by_window() {
        let mut limiter = RateLimiter::per_second(1_000).unwrap();
        let window = Duration::from_millis(250);
        let deadline = Instant::now() + window;

        let mut ticks = 0;
        loop {
            tokio::select! {
                biased;
                _ = tokio::time::sleep_until(deadline) => break,
                _ = limiter.tick() => ticks += 1,
            }
        }

        // One tick at the start plus one per elapsed period.
        assert!(ticks <= 251, "too many ticks: {ticks}");
        assert!(ticks >= 250, "too few ticks: {ticks}");
    }

    #[tokio::test(start_paused = true)]
    async fn late_consumer_catches_up() {
        let mut limiter = RateLimiter::per_second(1_000).unwrap();
        limiter.tick().await;

        // A stalled consumer gets the missed ticks back to back, not more.
        tokio::time::advance(Duration::from_millis(5)).await;
        let start = Instant::now();
        for _ in 0..5 {
            limiter.tick().await;
        }
        assert_eq!(Instant::now(), start);
    }
}
