//! test-retry: re-run only the tests that failed last time.
//!
//! This crate wraps a test-runner invocation. After each run, the normalized
//! report is stored in a remote bucket under a key derived from the source
//! fingerprint, the working directory, and the command. The next invocation
//! with the same key either skips the run entirely (everything passed) or
//! rewrites the command so the runner executes only what failed.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Report**: The normalized pass/fail model, plus reporter adapters that
//!   produce it from Jest and Jasmine results
//! - **Cache**: Best-effort report storage on S3 or an S3-compatible store
//! - **Rewrite**: Runner-specific command overrides (`-t` for names, `-f` for files)
//! - **Orchestrator**: The state machine deciding between skip, subset, and full runs
//! - **Config**: The TOML file, the environment snapshot, and per-run options
//!
//! # Example
//!
//! ```no_run
//! use test_retry::cache::ObjectStoreCache;
//! use test_retry::config::{Environment, RetryOptions, resolve_config};
//! use test_retry::orchestrator::{Orchestrator, ShellRunner};
//! use test_retry::rewrite::RunnerKind;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cwd = std::env::current_dir()?;
//!     let config = resolve_config(None, &cwd)?;
//!     let env = Environment::capture();
//!     let options = RetryOptions::new(cwd, "yarn jest".into(), RunnerKind::Jest, None, &config, &env);
//!
//!     let cache = ObjectStoreCache::from_config(&options.bucket, &config.cache, &env)?;
//!     let runner = ShellRunner::new(config.runner.shell.clone());
//!     let outcome = Orchestrator::new(options, cache, runner).run().await?;
//!     std::process::exit(outcome.exit_code);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod report;
pub mod rewrite;

// Re-export commonly used types
pub use cache::{CacheError, CacheKey, ObjectStoreCache, OfflineCache, ReportCache};
pub use config::{Config, Environment, RetryOptions, load_config};
pub use orchestrator::{CommandRunner, Orchestrator, Plan, RunOutcome, ShellRunner};
pub use report::{FileResult, Report, ReportError, TestResult};
pub use rewrite::{Invocation, RunnerKind};
