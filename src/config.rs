//! Configuration loading and the per-invocation options.
//!
//! Settings come from three places, merged once at startup:
//!
//! - an optional TOML file ([`Config`], see [`schema`]),
//! - the process environment ([`Environment`], see [`environment`]),
//! - the command line.
//!
//! The result is a [`RetryOptions`] value that the orchestrator receives by
//! reference. No component reads the environment or config file on its own.

pub mod environment;
pub mod schema;

pub use environment::Environment;
pub use schema::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::rewrite::RunnerKind;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "test-retry.toml";

/// Loads configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or doesn't match the schema.
///
/// # Example
///
/// ```no_run
/// use test_retry::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("test-retry.toml"))?;
/// println!("Bucket: {}", config.cache.bucket);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads configuration from a TOML string.
///
/// # Example
///
/// ```
/// use test_retry::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [cache]
///     expiry_days = 7
/// "#)?;
///
/// assert_eq!(config.cache.expiry_days, 7);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}

/// Resolves the configuration for a run.
///
/// An explicitly requested file must exist. Without one, `test-retry.toml` in
/// `cwd` is used if present, and defaults otherwise.
pub fn resolve_config(explicit: Option<&Path>, cwd: &Path) -> Result<Config> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let path = cwd.join(DEFAULT_CONFIG_FILE);
    if path.exists() {
        tracing::debug!("Loading configuration from {}", path.display());
        load_config(&path)
    } else {
        Ok(Config::default())
    }
}

/// Everything the orchestrator needs for one invocation.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Working directory of the child process. Its basename is part of the cache key.
    pub cwd: PathBuf,

    /// The user's test command, before any rewriting.
    pub user_command: String,

    /// Source tree fingerprint. Without it no cache key can be formed.
    pub content_hash: Option<String>,
    /// Bucket holding cached reports. The S3 client is built against this one.
    /// Bucket holding cached reports.
    pub bucket: String,

    /// Which rewrite strategy applies.
    pub runner: RunnerKind,

    /// When false, the command runs verbatim with no caching at all.
    pub enabled: bool,

    /// Where the reporter adapter writes this run's report.
    pub report_path: PathBuf,

    /// Shell used to run the command.
    pub shell: String,
}

impl RetryOptions {
    /// Assembles options from the command line, config file, and environment.
    ///
    /// `enabled` falls back to CI detection when not given explicitly.
    pub fn new(
        cwd: PathBuf,
        user_command: String,
        runner: RunnerKind,
        enabled: Option<bool>,
        config: &Config,
        env: &Environment,
    ) -> Self {
        let report_path = unique_report_path(&cwd);
        Self {
            cwd,
            user_command,
            content_hash: env.content_hash.clone(),
            bucket: config.cache.bucket.clone(),
            runner,
            enabled: enabled.unwrap_or(env.is_ci),
            report_path,
            shell: config.runner.shell.clone(),
        }
    }
}

/// Returns a report path in `cwd` that no other invocation will pick.
pub fn unique_report_path(cwd: &Path) -> PathBuf {
    cwd.join(format!("test-report-{}.json", uuid::Uuid::new_v4().simple()))
}
