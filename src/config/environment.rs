//! Snapshot of the process environment.
//!
//! The environment is read exactly once, in `main`, and passed around as an
//! [`Environment`] value. Library code never calls `std::env::var` itself, which
//! keeps every component testable with a hand-built snapshot.

use std::path::PathBuf;

/// Content fingerprint of the source tree, used verbatim in the cache key.
pub const CONTENT_HASH_VAR: &str = "SRC_MD5";

/// Access key for the report store.
pub const ACCESS_KEY_VAR: &str = "NPM_CI_AWS_ACCESS_KEY";

/// Secret key for the report store.
pub const SECRET_KEY_VAR: &str = "NPM_CI_AWS_SECRET_ACCESS_KEY";

/// Custom endpoint for S3-compatible stores. Enables path-style requests.
pub const ENDPOINT_VAR: &str = "NPM_CI_AWS_S3_ADDRESS";

/// Credentials profile overriding the configured one.
pub const PROFILE_VAR: &str = "NPM_CI_AWS_CREDENTIALS_PROFILE";

/// Location of the shared credentials file.
pub const SHARED_CREDENTIALS_FILE_VAR: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// Where a reporter adapter must write its report.
pub const REPORT_PATH_VAR: &str = "TEST_JSON_REPORTER_OUTPUT_PATH";

/// Set to `false` to make adapters write paths relative to the working directory.
pub const USE_ABSOLUTE_PATHS_VAR: &str = "TEST_JSON_REPORTER_USE_ABSOLUTE_PATHS";

/// Set to `true` to make adapters write paths exactly as the runner reports them.
pub const KEEP_PATH_AS_IS_VAR: &str = "KEEP_PATH_AS_IS";

/// Enables JSON reporting in file-granularity runners.
pub const ENABLE_JSON_REPORTER_VAR: &str = "ENABLE_JSON_REPORTER";

/// Variables whose presence marks a CI environment.
///
/// `CI=false` explicitly opts out regardless of the others.
pub const CI_MARKERS: &[&str] = &[
    "CI",
    "CONTINUOUS_INTEGRATION",
    "BUILD_NUMBER",
    "BUILD_ID",
    "RUN_ID",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "TEAMCITY_VERSION",
    "JENKINS_URL",
    "BUILDKITE",
];

/// Environment-supplied settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Source tree fingerprint (`SRC_MD5`).
    pub content_hash: Option<String>,

    /// Static access key for the store.
    pub access_key_id: Option<String>,

    /// Static secret key for the store.
    pub secret_access_key: Option<String>,

    /// Custom store endpoint.
    pub endpoint: Option<String>,

    /// Credentials profile override.
    pub credentials_profile: Option<String>,

    /// Shared credentials file override.
    pub shared_credentials_file: Option<PathBuf>,

    /// Whether a CI marker is present.
    pub is_ci: bool,

    /// Report output path, as seen by a reporter adapter.
    pub report_output_path: Option<PathBuf>,

    /// Absolute-path switch, as seen by a reporter adapter.
    pub use_absolute_paths: Option<bool>,

    /// Keep-as-is path switch, as seen by a reporter adapter.
    pub keep_path_as_is: bool,
}

impl Environment {
    /// Captures the current process environment.
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Builds a snapshot from key/value pairs. Empty values count as unset.
    ///
    /// # Example
    ///
    /// ```
    /// use test_retry::config::Environment;
    ///
    /// let env = Environment::from_vars([
    ///     ("SRC_MD5".to_string(), "abc123".to_string()),
    ///     ("BUILD_NUMBER".to_string(), "42".to_string()),
    /// ]);
    /// assert_eq!(env.content_hash.as_deref(), Some("abc123"));
    /// assert!(env.is_ci);
    /// ```
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: std::collections::HashMap<String, String> = vars
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let get = |key: &str| vars.get(key).cloned();

        let is_ci = match vars.get("CI").map(String::as_str) {
            Some("false") | Some("0") => false,
            _ => CI_MARKERS.iter().any(|marker| vars.contains_key(*marker)),
        };

        Self {
            content_hash: get(CONTENT_HASH_VAR),
            access_key_id: get(ACCESS_KEY_VAR),
            secret_access_key: get(SECRET_KEY_VAR),
            endpoint: get(ENDPOINT_VAR),
            credentials_profile: get(PROFILE_VAR),
            shared_credentials_file: get(SHARED_CREDENTIALS_FILE_VAR).map(PathBuf::from),
            is_ci,
            report_output_path: get(REPORT_PATH_VAR).map(PathBuf::from),
            use_absolute_paths: get(USE_ABSOLUTE_PATHS_VAR).map(|v| v == "true"),
            keep_path_as_is: get(KEEP_PATH_AS_IS_VAR).is_some_and(|v| v == "true"),
        }
    }
}
