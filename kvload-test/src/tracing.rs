//! Log capture for tests.

use tracing_subscriber::EnvFilter;

/// Crates whose logs are captured when `RUST_LOG` is unset.
const CAPTURED_CRATES: &[&str] = &["kvload", "kvload_core", "kvload_runner"];

/// Installs a subscriber that writes to the output captured by the test harness.
///
/// `RUST_LOG` takes precedence when set. Otherwise all kvload crates log at `TRACE` and
/// everything else at `WARN`. Every test may call this; only the first call in a process
/// installs the subscriber.
///
/// # Example
///
/// ```
/// kvload_test::tracing::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

fn default_filter() -> EnvFilter {
    CAPTURED_CRATES.iter().fold(EnvFilter::new("WARN"), |filter, name| {
        let directive = format!("{name}=TRACE").parse().expect("valid directive");
        filter.add_directive(directive)
    })
}
