use thiserror::Error;

/// Errors raised when a workload is parameterized with values the dispatcher cannot run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The target issuance rate must be at least one operation per second.
    #[error("rate must be greater than zero")]
    ZeroRate,

    /// Ticks are scheduled with nanosecond precision, so the period must be at least 1ns.
    #[error("rate {rate} exceeds the maximum of {max} operations per second")]
    RateTooHigh {
        /// The requested rate.
        rate: u32,
        /// The highest supported rate.
        max: u32,
    },

    /// The read/write cycle must contain at least one position.
    #[error("cycle length must be at least 1")]
    EmptyCycle,

    /// The write share of a cycle cannot exceed the cycle length.
    #[error("writes ({writes}) exceed the cycle length ({cycle})")]
    WritesExceedCycle {
        /// Number of write positions per cycle.
        writes: u32,
        /// Length of the cycle.
        cycle: u32,
    },

    /// Keys are drawn from `[1, keyspace]`, so the keyspace cannot be empty.
    #[error("keyspace must contain at least one key")]
    EmptyKeyspace,

    /// An in-flight limit of zero would never admit an operation.
    #[error("max_in_flight must be greater than zero when set")]
    ZeroInFlight,
}
