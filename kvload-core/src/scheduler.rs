//! The read/write ratio scheduler.
//!
//! The scheduler walks a counter through the cycle `1..=N`. Positions `1..=W` dispatch writes and
//! the remaining `N - W` positions dispatch reads, so every cycle is a contiguous block of
//! writes followed by a contiguous block of reads. With the default `W = 6, N = 10` this is a
//! 60% write / 40% read mix.

use crate::error::ConfigError;
use crate::latency::OperationKind;

/// Deterministic, cyclic choice between writes and reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RatioScheduler {
    writes: u32,
    cycle: u32,
    counter: u32,
}

impl RatioScheduler {
    /// Creates a scheduler dispatching `writes` writes out of every `cycle` operations.
    pub fn new(writes: u32, cycle: u32) -> Result<Self, ConfigError> {
        if cycle == 0 {
            return Err(ConfigError::EmptyCycle);
        }
        if writes > cycle {
            return Err(ConfigError::WritesExceedCycle { writes, cycle });
        }

        Ok(Self {
            writes,
            cycle,
            counter: 1,
        })
    }

    /// The current position in the cycle, in `1..=cycle`.
    pub fn position(&self) -> u32 {
        self.counter
    }

    /// Returns the kind of the next operation and advances the counter.
    pub fn next_kind(&mut self) -> OperationKind {
        let kind = if self.counter <= self.writes {
            OperationKind::Write
        } else {
            OperationKind::Read
        };

        self.counter = if self.counter == self.cycle {
            1
        } else {
            self.counter + 1
        };

        kind
    }
}

impl Iterator for RatioScheduler {
    type Item = OperationKind;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::latency::OperationKind::{Read as R, Write as W};

    #[test]
    fn reference_cycle() {
        let scheduler = RatioScheduler::new(6, 10).unwrap();
        let kinds: Vec<_> = scheduler.take(12).collect();
        assert_eq!(kinds, [W, W, W, W, W, W, R, R, R, R, W, W]);
    }

    #[test]
    fn counter_wraps_after_cycle() {
        let mut scheduler = RatioScheduler::new(6, 10).unwrap();
        assert_eq!(scheduler.position(), 1);

        for expected in (2..=10).chain([1, 2]) {
            scheduler.next_kind();
            assert_eq!(scheduler.position(), expected);
        }
    }

    #[test]
    fn blocks_are_contiguous_for_any_ratio() {
        for cycle in 1..=12 {
            for writes in 0..=cycle {
                let scheduler = RatioScheduler::new(writes, cycle).unwrap();
                let kinds: Vec<_> = scheduler.take((cycle * 3) as usize).collect();

                for block in kinds.chunks(cycle as usize) {
                    let (head, tail) = block.split_at(writes as usize);
                    assert!(head.iter().all(|k| *k == W), "{writes}/{cycle}");
                    assert!(tail.iter().all(|k| *k == R), "{writes}/{cycle}");
                }
            }
        }
    }

    #[test]
    fn degenerate_ratios() {
        let all_reads = RatioScheduler::new(0, 4).unwrap();
        assert!(all_reads.take(8).all(|k| k == R));

        let all_writes = RatioScheduler::new(4, 4).unwrap();
        assert!(all_writes.take(8).all(|k| k == W));

        let single = RatioScheduler::new(1, 1).unwrap();
        assert!(single.take(3).all(|k| k == W));
    }

    #[test]
    fn rejects_invalid_ratios() {
        assert_eq!(RatioScheduler::new(0, 0), Err(ConfigError::EmptyCycle));
        assert_eq!(
            RatioScheduler::new(3, 2),
            Err(ConfigError::WritesExceedCycle {
                writes: 3,
                cycle: 2
            })
        );
    }
}
