//! The `kvload` command line entry point.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    kvload_runner::cli::execute()
}
