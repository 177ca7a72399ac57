//! The `kvload` runner.
//!
//! This wires the dispatch engine of [`kvload_core`] to a concrete store chosen by
//! configuration, serves the latency summaries over HTTP while the workload runs, and prints a
//! report once the run ends.

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod exposition;
pub mod healthcheck;
pub mod observability;
pub mod report;
pub mod run;
pub mod state;
pub mod web;
