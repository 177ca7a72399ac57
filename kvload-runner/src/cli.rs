use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::{healthcheck, observability, run};

/// Synthetic load generator for key-value stores.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Healthcheck(HealthcheckCommand),
    Version(VersionCommand),
}

/// run the configured workload and serve its latency metrics
// Options given here take precedence over the configuration file and environment.
#[derive(Debug, Default, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// target operations per second
    #[argh(option, short = 'r')]
    rate: Option<u32>,

    /// stop after this long, for example `30s` or `5m`
    #[argh(option, short = 'd', from_str_fn(parse_duration))]
    duration: Option<Duration>,

    /// seed for reproducible keys and values
    #[argh(option)]
    seed: Option<u64>,
}

impl RunCommand {
    fn apply(self, config: &mut Config) {
        let workload = &mut config.workload;
        if let Some(rate) = self.rate {
            workload.rate = rate;
        }
        if let Some(duration) = self.duration {
            workload.duration = Some(duration);
        }
        if let Some(seed) = self.seed {
            workload.seed = Some(seed);
        }
    }
}

/// check that the metrics endpoint of a running workload is healthy
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "healthcheck")]
struct HealthcheckCommand {}

/// print the kvload version
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

/// Parses the command line, sets up the runtime and observability, and runs the command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let mut command = match args.command {
        Command::Version(VersionCommand {}) => {
            println!("kvload {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        command => command,
    };

    let mut config = Config::load(args.config.as_deref())?;
    if let Command::Run(ref mut run) = command {
        std::mem::take(run).apply(&mut config);
    }

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("kvload-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads)
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    let metrics_guard = observability::init_metrics(&config)?;

    let result = runtime.block_on(async move {
        match command {
            Command::Run(_) => run::run(config).await.map(|_| ()),
            Command::Healthcheck(HealthcheckCommand {}) => healthcheck::healthcheck(config).await,
            Command::Version(_) => unreachable!("handled before loading the configuration"),
        }
    });

    // Flush metrics unconditionally before shutdown, even on error.
    runtime.block_on(async {
        if let Some(metrics_guard) = metrics_guard {
            metrics_guard.flush(None).await.ok();
        }
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["kvload"], args).unwrap()
    }

    #[test]
    fn parses_run_overrides() {
        let args = parse(&[
            "-c", "kvload.yml", "run", "-r", "500", "-d", "1m 30s", "--seed", "7",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("kvload.yml")));

        let Command::Run(run) = args.command else {
            panic!("expected run command");
        };
        let mut config = Config::default();
        run.apply(&mut config);

        assert_eq!(config.workload.rate, 500);
        assert_eq!(config.workload.duration, Some(Duration::from_secs(90)));
        assert_eq!(config.workload.seed, Some(7));
        assert_eq!(config.workload.cycle, 10);
    }

    #[test]
    fn run_without_overrides_keeps_config() {
        let Command::Run(run) = parse(&["run"]).command else {
            panic!("expected run command");
        };
        let mut config = Config::default();
        run.apply(&mut config);

        assert_eq!(config.workload, Config::default().workload);
    }

    #[test]
    fn invalid_duration_is_rejected() {
        assert!(Args::from_args(&["kvload"], &["run", "-d", "soon"]).is_err());
    }

    #[test]
    fn other_commands() {
        assert!(matches!(
            parse(&["healthcheck"]).command,
            Command::Healthcheck(_)
        ));
        assert!(matches!(parse(&["version"]).command, Command::Version(_)));
    }
}
