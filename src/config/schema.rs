//! Configuration schema for test-retry.
//!
//! All settings are optional. An absent file, table, or key falls back to the
//! defaults documented on each field.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── CacheConfig    - Remote report store (bucket, region, expiry, retries)
//! └── RunnerConfig   - How the user's test command is executed
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
///
/// # TOML Structure
///
/// ```toml
/// [cache]
/// bucket = "my-ci-results"
/// prefix = "test-reports"
/// region = "eu-west-1"
/// expiry_days = 14
///
/// [runner]
/// shell = "/bin/bash"
/// ```
///
/// # Example
///
/// ```
/// use test_retry::config::Config;
///
/// let config: Config = toml::from_str(r#"
///     [cache]
///     bucket = "my-ci-results"
/// "#).unwrap();
///
/// assert_eq!(config.cache.bucket, "my-ci-results");
/// assert_eq!(config.runner.shell, "/bin/sh");
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Remote report store settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Child process settings.
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Settings for the remote report store.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `bucket` | `"wix-ci-results"` |
/// | `prefix` | `""` (bucket root) |
/// | `region` | `"us-east-1"` |
/// | `expiry_days` | 30 |
/// | `profile` | `"cache-aws"` |
/// | `allow_http` | true |
/// | `max_retries` | 2 |
/// | `timeout_secs` | 30 |
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Bucket holding one report object per cache key.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Key prefix inside the bucket.
    ///
    /// Useful when several projects share a bucket. Empty means the bucket root.
    #[serde(default)]
    pub prefix: String,

    /// Region used to sign requests.
    ///
    /// S3-compatible stores behind a custom endpoint usually accept any value.
    #[serde(default = "default_region")]
    pub region: String,

    /// Days until an uploaded report is considered expired.
    #[serde(default = "default_expiry_days")]
    pub expiry_days: u32,

    /// Credentials profile read from the shared credentials file when no
    /// access key is present in the environment.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Allow plain-HTTP endpoints (local S3-compatible servers).
    #[serde(default = "default_true")]
    pub allow_http: bool,

    /// Transport-level retries per request before the store is reported as
    /// unavailable.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Upper bound in seconds on the time spent on one request, retries included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CacheConfig {
    /// Returns the request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            prefix: String::new(),
            region: default_region(),
            expiry_days: default_expiry_days(),
            profile: default_profile(),
            allow_http: true,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_bucket() -> String {
    "wix-ci-results".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_expiry_days() -> u32 {
    30
}

fn default_profile() -> String {
    "cache-aws".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> usize {
    2
}

fn default_timeout_secs() -> u64 {
    30
}

/// Settings for running the user's test command.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Shell used to run the command (`<shell> -c <command>`).
    ///
    /// Default: `/bin/sh`
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
        }
    }
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}
