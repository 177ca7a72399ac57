//! Human readable summary of a finished run.

use std::fmt::{self, Write};
use std::time::Duration;

use kvload_core::{DispatchReport, LatencySummaries, OperationKind};
use sketches_ddsketch::DDSketch;
use yansi::Paint;

/// Prints the report of a finished run to stdout.
pub fn print_report(report: &DispatchReport, summaries: &LatencySummaries) {
    print!("{}", render(report, summaries));
}

/// Renders the report of a finished run.
///
/// Every kind with at least one dispatched operation gets its own section, followed by a total
/// over all kinds.
pub fn render(report: &DispatchReport, summaries: &LatencySummaries) -> String {
    let mut out = String::new();
    // Writing into a `String` cannot fail.
    write_report(&mut out, report, summaries).ok();
    out
}

fn write_report(
    out: &mut impl Write,
    report: &DispatchReport,
    summaries: &LatencySummaries,
) -> fmt::Result {
    let duration = report.elapsed;
    writeln!(
        out,
        "{} {} ticks in {:.2?}, at most {} operations in flight",
        "RUN:".bold().cyan(),
        report.ticks.bold(),
        duration,
        report.peak_in_flight.bold()
    )?;
    if report.rejected > 0 {
        writeln!(
            out,
            "  {}",
            format!("{} ticks dropped at the in-flight limit", report.rejected)
                .bold()
                .yellow()
        )?;
    }

    let mut total = DDSketch::default();
    for kind in OperationKind::ALL {
        let sketch = summaries.get(kind).sketch();
        let failures = report.failures(kind);
        let label = match kind {
            OperationKind::Write => "WRITE:",
            OperationKind::Read => "READ:",
        };

        write_section(out, label, report.count(kind), failures, &sketch, duration)?;

        if total.count() == 0 {
            total = sketch;
        } else if let Err(error) = total.merge(&sketch) {
            tracing::warn!(%error, "failed to merge latency sketches");
        }
    }

    let failures = report.write_failures + report.read_failures;
    write_section(out, "TOTAL:", report.dispatched(), failures, &total, duration)
}

fn write_section(
    out: &mut impl Write,
    label: &str,
    ops: u64,
    failures: u64,
    sketch: &DDSketch,
    duration: Duration,
) -> fmt::Result {
    if ops == 0 {
        return Ok(());
    }

    write!(out, "{} ({} ops", label.bold().green(), ops.bold())?;
    if failures > 0 {
        write!(out, ", {}", format!("{failures} FAILURES").bold().red())?;
    }
    writeln!(out, ")")?;

    let ops_ps = ops as f64 / duration.as_secs_f64().max(f64::EPSILON);
    writeln!(out, "  {:.2} operations/s", ops_ps.bold())?;

    write_percentiles(out, sketch)
}

fn write_percentiles(out: &mut impl Write, sketch: &DDSketch) -> fmt::Result {
    let (Some(sum), Ok(Some(p50)), Ok(Some(p90)), Ok(Some(p99))) = (
        sketch.sum(),
        sketch.quantile(0.5),
        sketch.quantile(0.9),
        sketch.quantile(0.99),
    ) else {
        return Ok(());
    };

    let nanos = |value: f64| Duration::from_nanos(value as u64);
    let avg = nanos(sum / sketch.count() as f64);
    let (p50, p90, p99) = (nanos(p50), nanos(p90), nanos(p99));

    writeln!(
        out,
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    )
}
