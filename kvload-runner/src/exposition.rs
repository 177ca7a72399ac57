//! Plain text rendering of the latency summaries.
//!
//! The output follows the Prometheus text format for summaries. Each operation kind is exported
//! under its own metric name with one sample per objective quantile, plus `_sum` and `_count`.
//! Values are in nanoseconds.
//!
//! ```text
//! # HELP set_exec_time SET execution time summary
//! # TYPE set_exec_time summary
//! set_exec_time{quantile="0.5"} 10240
//! set_exec_time{quantile="0.9"} 19712
//! set_exec_time{quantile="0.99"} 24576
//! set_exec_time_sum 1234500
//! set_exec_time_count 100
//! ```

use std::fmt::{self, Write};

use kvload_core::latency::SummarySnapshot;
use kvload_core::{LatencySummaries, OperationKind};

/// Content type of the rendered text.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Returns the metric name and help text for an operation kind.
fn metric(kind: OperationKind) -> (&'static str, &'static str) {
    match kind {
        OperationKind::Write => ("set_exec_time", "SET execution time summary"),
        OperationKind::Read => ("get_exec_time", "GET execution time summary"),
    }
}

/// Renders the summaries of all operation kinds.
pub fn render(summaries: &LatencySummaries) -> String {
    let mut out = String::new();
    for kind in OperationKind::ALL {
        let snapshot = summaries.get(kind).snapshot();
        // Writing into a `String` cannot fail.
        write_summary(&mut out, kind, &snapshot).ok();
    }
    out
}

fn write_summary(
    out: &mut impl Write,
    kind: OperationKind,
    snapshot: &SummarySnapshot,
) -> fmt::Result {
    let (name, help) = metric(kind);
    writeln!(out, "# HELP {name} {help}")?;
    writeln!(out, "# TYPE {name} summary")?;
    for (objective, value) in &snapshot.quantiles {
        let value = value.unwrap_or(f64::NAN);
        writeln!(out, "{name}{{quantile=\"{}\"}} {value}", objective.quantile)?;
    }
    writeln!(out, "{name}_sum {}", snapshot.sum)?;
    writeln!(out, "{name}_count {}", snapshot.count)
}
