//! test-retry CLI - re-run only the tests that failed last time.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use futures::FutureExt;
use tracing::{debug, error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use test_retry::cache::{ObjectStoreCache, OfflineCache, ReportCache};
use test_retry::config::{self, Environment, RetryOptions};
use test_retry::orchestrator::{CommandRunner, Orchestrator, ShellRunner};
use test_retry::rewrite::RunnerKind;

const MISSING_COMMAND: &str = "error: missing command to run after \"--\". valid example: test-retry --test-runner jest -- yarn jest";

#[derive(Parser)]
#[command(name = "test-retry")]
#[command(about = "Re-run only the tests that failed last time", long_about = None)]
#[command(version)]
struct Cli {
    /// Test runner integration (jest, sled-local, sled-remote)
    #[arg(long, value_enum)]
    test_runner: RunnerKind,

    /// Use cached reports to skip or narrow the run [default: true on CI]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    enabled: Option<bool>,

    /// Configuration file path [default: ./test-retry.toml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Test command to run
    #[arg(last = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(1);
            }
        },
    };

    let user_command = cli.command.join(" ");
    if user_command.trim().is_empty() {
        eprintln!("{}", MISSING_COMMAND);
        std::process::exit(1);
    }

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }

    std::process::exit(exit_code_of(run(cli, user_command)).await);
}

/// Maps the outcome of a run to the process exit code. Errors and panics are 1.
async fn exit_code_of<F>(run: F) -> i32
where
    F: Future<Output = Result<i32>>,
{
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(Ok(exit_code)) => exit_code,
        Ok(Err(e)) => {
            error!("{:#}", e);
            1
        }
        Err(_) => {
            error!("Internal error: test-retry panicked");
            1
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,test_retry={}", level)));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(cli: Cli, user_command: String) -> Result<i32> {
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let config = config::resolve_config(cli.config.as_deref(), &cwd)?;
    let env = Environment::capture();

    let options = RetryOptions::new(
        cwd,
        user_command,
        cli.test_runner,
        cli.enabled,
        &config,
        &env,
    );
    let runner = ShellRunner::new(options.shell.clone());

    if !options.enabled {
        return run_with(options, OfflineCache::new("test retry is disabled"), runner).await;
    }

    match ObjectStoreCache::from_config(&options.bucket, &config.cache, &env) {
        Ok(cache) => run_with(options, cache, runner).await,
        Err(e) => {
            warn!("Couldn't set up the report cache ({}), continuing without it", e);
            run_with(options, OfflineCache::new(e.to_string()), runner).await
        }
    }
}

async fn run_with<C, R>(options: RetryOptions, cache: C, runner: R) -> Result<i32>
where
    C: ReportCache,
    R: CommandRunner,
{
    debug!(
        "Runner: {}, bucket: {}, report path: {}",
        options.runner,
        options.bucket,
        options.report_path.display()
    );

    let orchestrator = Orchestrator::new(options, cache, runner);
    let outcome = orchestrator.run().await?;

    debug!("Finished with plan {} (exit code {})", outcome.plan, outcome.exit_code);
    Ok(outcome.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exit_code_passes_through() {
        assert_eq!(exit_code_of(async { Ok(0) }).await, 0);
        assert_eq!(exit_code_of(async { Ok(7) }).await, 7);
    }

    #[tokio::test]
    async fn test_error_exits_one() {
        let code = exit_code_of(async { Err(anyhow::anyhow!("shell missing")) }).await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_panic_exits_one() {
        let code = exit_code_of(async {
            if std::hint::black_box(true) {
                panic!("runner blew up");
            }
            Ok(0)
        })
        .await;
        assert_eq!(code, 1);
    }
}
