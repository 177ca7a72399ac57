//! Test utilities for kvload.
//!
//! This crate provides utilities to facilitate testing of the dispatch engine and the runner.
//! See the modules for all available utilities.

pub mod server;
pub mod store;
pub mod tracing;
