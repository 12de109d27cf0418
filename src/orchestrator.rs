//! Retry orchestration.
//!
//! The [`Orchestrator`] decides, per invocation, whether the user's test
//! command needs to run at all, and if so which subset of it.
//!
//! # State Machine
//!
//! ```text
//!   Init ──(disabled)──────────────────────────────► Disabled ──► run verbatim
//!     │
//!     ▼
//!   Deciding ──(no key / not cached / cache error)──► RunAll ────┐
//!     │                                                          │
//!     ├──(cached report passed)──────────────────────► SkipAll   │
//!     │                                                          ▼
//!     └──(cached report failed)──────────────────────► RunSubset ──► persist report
//! ```
//!
//! # Guarantees
//!
//! - The cache never decides the outcome of a run. Every cache or report
//!   failure is logged and the orchestrator falls back to running everything.
//! - After the child runs in `RunAll` or `RunSubset`, the local report is
//!   uploaded under the same key on every exit path, including a child that
//!   failed, failed to start, or panicked inside the runner.
//! - The exit code is the child's, except for `SkipAll` which is always 0.
//!
//! # Example
//!
//! ```no_run
//! use test_retry::cache::ObjectStoreCache;
//! use test_retry::config::{Config, Environment, RetryOptions};
//! use test_retry::orchestrator::{Orchestrator, ShellRunner};
//! use test_retry::rewrite::RunnerKind;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let env = Environment::capture();
//!     let options = RetryOptions::new(
//!         std::env::current_dir()?,
//!         "yarn jest".to_string(),
//!         RunnerKind::Jest,
//!         Some(true),
//!         &config,
//!         &env,
//!     );
//!
//!     let cache = ObjectStoreCache::from_config(&options.bucket, &config.cache, &env)?;
//!     let orchestrator = Orchestrator::new(options, cache, ShellRunner::default());
//!     let outcome = orchestrator.run().await?;
//!
//!     std::process::exit(outcome.exit_code);
//! }
//! ```

pub mod runner;

use std::panic::AssertUnwindSafe;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::cache::{CacheKey, ReportCache};
use crate::config::RetryOptions;
use crate::config::environment::REPORT_PATH_VAR;
use crate::report::{Report, ReportError};
use crate::rewrite::Invocation;

pub use runner::{CommandRunner, RunnerError, ShellRunner};

/// What the orchestrator decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Caching is off; the command ran exactly as given.
    Disabled,
    /// No usable prior report; the full command ran.
    RunAll,
    /// The prior report failed; only its failures were re-run.
    RunSubset,
    /// The prior report passed; nothing ran.
    SkipAll,
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Plan::Disabled => "disabled",
            Plan::RunAll => "run-all",
            Plan::RunSubset => "run-subset",
            Plan::SkipAll => "skip-all",
        };
        f.write_str(name)
    }
}

/// Result of one orchestrated invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// The path taken through the state machine.
    pub plan: Plan,

    /// Exit code for the whole process.
    pub exit_code: i32,
}

/// Ties the cache, the command rewriter, and the child process together.
pub struct Orchestrator<C, R> {
    options: RetryOptions,
    cache: C,
    runner: R,
}

impl<C, R> Orchestrator<C, R>
where
    C: ReportCache,
    R: CommandRunner,
{
    pub fn new(options: RetryOptions, cache: C, runner: R) -> Self {
        Self {
            options,
            cache,
            runner,
        }
    }

    /// Runs one invocation to completion.
    ///
    /// # Errors
    ///
    /// Only an internal failure, such as the shell failing to start, is an
    /// error. Cache and report problems are logged and recovered from.
    pub async fn run(&self) -> Result<RunOutcome> {
        let options = &self.options;

        if !options.enabled {
            info!("Test retry is disabled, running the command as is");
            let exit_code = self
                .runner
                .run(&options.user_command, &[], &options.cwd)
                .await
                .context("Failed to run test command")?;
            return Ok(RunOutcome {
                plan: Plan::Disabled,
                exit_code,
            });
        }

        let Some(content_hash) = options.content_hash.as_deref() else {
            warn!("No source fingerprint (SRC_MD5) is set, running all tests without the cache");
            let invocation = options.runner.rewrite(&options.user_command, None);
            let exit_code = self
                .execute(&invocation)
                .await
                .context("Failed to run test command")?;
            return Ok(RunOutcome {
                plan: Plan::RunAll,
                exit_code,
            });
        };

        let key = CacheKey::derive(content_hash, &options.cwd, &options.user_command);
        tracing::debug!("Cache key: {}", key);

        let prior = self.fetch_prior(&key).await;
        let (plan, invocation) = match &prior {
            Some(report) if report.passed => {
                info!(
                    "All tests passed on the last run with this source ({}), skipping",
                    report.summary()
                );
                return Ok(RunOutcome {
                    plan: Plan::SkipAll,
                    exit_code: 0,
                });
            }
            Some(report) => {
                info!(
                    "Re-running failed tests from the last run ({})",
                    report.summary()
                );
                (
                    Plan::RunSubset,
                    options.runner.rewrite(&options.user_command, Some(report)),
                )
            }
            None => (
                Plan::RunAll,
                options.runner.rewrite(&options.user_command, None),
            ),
        };

        let exit_code = self.execute_and_persist(&key, &invocation).await?;
        Ok(RunOutcome { plan, exit_code })
    }

    /// Looks up the prior report for `key`. Any failure means "no prior report".
    async fn fetch_prior(&self, key: &CacheKey) -> Option<Report> {
        match self.cache.exists(key).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Couldn't find last test report for this source, running all tests");
                return None;
            }
            Err(e) => {
                warn!("Couldn't check for last test report ({}), running all tests", e);
                return None;
            }
        }

        let raw = match self.cache.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Couldn't fetch last test report ({}), running all tests", e);
                return None;
            }
        };

        match Report::parse(&raw) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Last test report is malformed ({}), running all tests", e);
                None
            }
        }
    }

    async fn execute(&self, invocation: &Invocation) -> Result<i32, RunnerError> {
        let mut env = invocation.env.clone();
        env.push((
            REPORT_PATH_VAR.to_string(),
            self.options.report_path.to_string_lossy().into_owned(),
        ));

        info!("Running: {}", invocation.command);
        self.runner
            .run(&invocation.command, &env, &self.options.cwd)
            .await
    }

    /// Runs the child, then persists the local report whatever happened to it.
    async fn execute_and_persist(&self, key: &CacheKey, invocation: &Invocation) -> Result<i32> {
        let result = AssertUnwindSafe(self.execute(invocation))
            .catch_unwind()
            .await;

        self.persist(key).await;

        match result {
            Ok(exit_code) => exit_code.context("Failed to run test command"),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Uploads the local report under `key`. Failures are logged, never returned.
    async fn persist(&self, key: &CacheKey) {
        let path = &self.options.report_path;

        let report = match Report::read(path).await {
            Ok(report) => report,
            Err(ReportError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "No test report was written to {}, results won't be cached",
                    path.display()
                );
                return;
            }
            Err(e) => {
                error!(
                    "Couldn't read test report {} ({}), results won't be cached",
                    path.display(),
                    e
                );
                return;
            }
        };

        let body = match report.to_json() {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                error!("Couldn't serialize test report ({}), results won't be cached", e);
                return;
            }
        };

        match self.cache.put(key, body).await {
            Ok(()) => info!("Saved test report for the next run ({})", report.summary()),
            Err(e) => warn!("Couldn't save test report ({})", e),
        }
    }
}
