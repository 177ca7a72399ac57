//! Parameters of a workload.
//!
//! [`WorkloadConfig`] carries the constants that shape the dispatch loop: the issuance rate, the
//! read/write cycle, and the shape of generated keys and values. It is plain data; the binary
//! fills it from its configuration layers and hands it to [`Dispatcher::new`].
//!
//! [`Dispatcher::new`]: crate::Dispatcher::new

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rate_limiter;

/// Operations issued per second by default.
pub const DEFAULT_RATE: u32 = 40_000;
/// Write positions per cycle by default.
pub const DEFAULT_WRITES: u32 = 6;
/// Length of the read/write cycle by default.
pub const DEFAULT_CYCLE: u32 = 10;
/// Upper bound of the key integer range by default.
pub const DEFAULT_KEYSPACE: u32 = 29_999;
/// Size in bytes of written values by default.
pub const DEFAULT_VALUE_SIZE: usize = 1024;
/// Namespace prefix of generated keys by default.
pub const DEFAULT_KEY_PREFIX: &str = "memtier";

/// Configuration of the dispatch loop and the generated records.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Target number of operations issued per second.
    ///
    /// The dispatcher launches at most one operation per tick, with ticks spaced `1s / rate`
    /// apart.
    pub rate: u32,

    /// Number of leading positions in each cycle that dispatch a write.
    ///
    /// Positions `1..=writes` are writes, positions `writes+1..=cycle` are reads.
    pub writes: u32,

    /// Length of the read/write cycle.
    pub cycle: u32,

    /// Keys are drawn uniformly from `[1, keyspace]`.
    pub keyspace: u32,

    /// Size in bytes of each written value.
    pub value_size: usize,

    /// Namespace prefix of generated keys, joined to the integer with a dash.
    pub key_prefix: String,

    /// Maximum number of operations in flight at once.
    ///
    /// When the limit is reached, ticks are dropped instead of launching more operations. `None`
    /// admits every tick regardless of how many operations are still running.
    pub max_in_flight: Option<usize>,

    /// Seed for the master random generator.
    ///
    /// A fixed seed makes the sequence of keys and values reproducible. Defaults to a random
    /// seed per run.
    pub seed: Option<u64>,

    /// Stop dispatching after this long. Runs until cancelled when unset.
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
}

impl WorkloadConfig {
    /// Checks that the dispatcher can run with these parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        rate_limiter::period_for(self.rate)?;
        if self.cycle == 0 {
            return Err(ConfigError::EmptyCycle);
        }
        if self.writes > self.cycle {
            return Err(ConfigError::WritesExceedCycle {
                writes: self.writes,
                cycle: self.cycle,
            });
        }
        if self.keyspace == 0 {
            return Err(ConfigError::EmptyKeyspace);
        }
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::ZeroInFlight);
        }
        Ok(())
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            writes: DEFAULT_WRITES,
            cycle: DEFAULT_CYCLE,
            keyspace: DEFAULT_KEYSPACE,
            value_size: DEFAULT_VALUE_SIZE,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            max_in_flight: None,
            seed: None,
            duration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(WorkloadConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let config = WorkloadConfig {
            rate: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRate));

        let config = WorkloadConfig {
            rate: 2_000_000_000,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RateTooHigh {
                rate: 2_000_000_000,
                max: rate_limiter::MAX_RATE
            })
        );

        let config = WorkloadConfig {
            cycle: 0,
            writes: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyCycle));

        let config = WorkloadConfig {
            writes: 11,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::WritesExceedCycle {
                writes: 11,
                cycle: 10
            })
        );

        let config = WorkloadConfig {
            keyspace: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyKeyspace));

        let config = WorkloadConfig {
            max_in_flight: Some(0),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInFlight));
    }

    #[test]
    fn all_reads_and_all_writes_are_valid() {
        let config = WorkloadConfig {
            writes: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));

        let config = WorkloadConfig {
            writes: 10,
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }
}
