use std::sync::Arc;

use anyhow::{Context, Result};
use kvload_core::latency::LatencySink;
use kvload_core::{DispatchReport, Dispatcher, LatencyRecorder, LatencySummaries};
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::state::{self, State};
use crate::{report, web};

/// Runs the configured workload until it is signalled to stop or its duration elapses.
///
/// The metrics endpoint serves the latency summaries for the whole run. Once the dispatch loop
/// has drained, the endpoint shuts down and the report is printed to stdout.
pub async fn run(config: Config) -> Result<DispatchReport> {
    tracing::info!("Starting workload");

    let listener = web::listen(config.http_addr).context("failed to start TCP listener")?;
    let store = state::connect(&config.store).await?;

    let summaries = Arc::new(LatencySummaries::default());
    let sink: Arc<dyn LatencySink> = summaries.clone();
    let dispatcher = Dispatcher::new(&config.workload, store, LatencyRecorder::new(sink))
        .context("invalid workload configuration")?;

    let token = CancellationToken::new();

    let server_handle = tokio::spawn(
        web::App::new(State::new(summaries.clone()))
            .graceful_shutdown(token.clone())
            .serve(listener),
    );

    let dispatch_handle = tokio::spawn({
        let token = token.clone();
        async move {
            let report = dispatcher.run(token.clone()).await;
            // Also stops the endpoint when the configured duration ended the run.
            token.cancel();
            report
        }
    });

    tokio::spawn({
        let token = token.clone();
        async move {
            elegant_departure::get_shutdown_guard().wait().await;
            tracing::info!("Shutting down ...");
            token.cancel();
        }
    });

    let departure = elegant_departure::tokio::depart()
        .on_termination()
        .on_sigint()
        .on_signal(SignalKind::hangup())
        .on_signal(SignalKind::quit());

    tokio::select! {
        _ = departure => {}
        _ = token.cancelled() => {}
    }

    let report = dispatch_handle.await.context("dispatch loop panicked")?;
    let server_result = server_handle.await.map_err(From::from).flatten();

    report::print_report(&report, &summaries);
    tracing::info!("Shutdown complete");

    server_result.map(|()| report)
}
