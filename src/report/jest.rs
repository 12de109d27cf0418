//! Jest reporter adapter.
//!
//! Converts the aggregated result object Jest hands to a custom reporter's
//! `onRunComplete` hook (also the shape of `jest --json` output) into a
//! normalized [`Report`].
//!
//! Only the fields the report needs are read:
//!
//! ```json
//! {
//!   "testResults": [
//!     {
//!       "testFilePath": "/repo/__tests__/math.spec.js",
//!       "testResults": [
//!         { "fullName": "math adds", "status": "passed" },
//!         { "fullName": "math divides", "status": "failed" },
//!         { "fullName": "math todo", "status": "pending" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{FileResult, Report, ReportResult, TestResult, write_report};
use crate::config::Environment;

/// Placeholder path used when a test file cannot be resolved on disk.
pub const PATH_NOT_FOUND: &str = "test-file-path-not-found";

/// Output file used when neither the environment nor the options name one.
pub const DEFAULT_OUTPUT_PATH: &str = "./jest-simple-json-reporter-results.json";

/// How test file paths are written into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMode {
    /// Canonical absolute path.
    #[default]
    Absolute,
    /// Canonical path with the working directory replaced by `.`.
    Relative,
    /// The path exactly as Jest reported it.
    KeepAsIs,
}

/// Options for [`JestAdapter`].
///
/// | Field | Default | Environment override |
/// |-------|---------|----------------------|
/// | `output_path` | `./jest-simple-json-reporter-results.json` | `TEST_JSON_REPORTER_OUTPUT_PATH` |
/// | `path_mode` | [`PathMode::Absolute`] | `KEEP_PATH_AS_IS=true`, `TEST_JSON_REPORTER_USE_ABSOLUTE_PATHS=false` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JestAdapterOptions {
    /// Where the report file is written.
    pub output_path: PathBuf,

    /// How test file paths are rendered.
    pub path_mode: PathMode,
}

impl Default for JestAdapterOptions {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            path_mode: PathMode::Absolute,
        }
    }
}

impl JestAdapterOptions {
    /// Resolves options from the environment snapshot, falling back to defaults.
    ///
    /// `KEEP_PATH_AS_IS` takes precedence over the absolute-paths switch.
    pub fn from_environment(env: &Environment) -> Self {
        let output_path = env
            .report_output_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));

        let path_mode = if env.keep_path_as_is {
            PathMode::KeepAsIs
        } else if env.use_absolute_paths == Some(false) {
            PathMode::Relative
        } else {
            PathMode::Absolute
        };

        Self {
            output_path,
            path_mode,
        }
    }
}

/// Jest's aggregated run result (subset).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestAggregatedResult {
    #[serde(default)]
    pub test_results: Vec<JestFileResult>,
}

/// Results for one test file (subset).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestFileResult {
    pub test_file_path: String,
    #[serde(default)]
    pub test_results: Vec<JestAssertionResult>,
}

/// Result of one test case (subset).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestAssertionResult {
    pub full_name: String,
    pub status: String,
}

impl JestAssertionResult {
    fn to_test_result(&self) -> TestResult {
        TestResult {
            full_name: self.full_name.clone(),
            did_run: self.status == "passed" || self.status == "failed",
            passed: self.status == "passed",
        }
    }
}

/// Converts Jest results into normalized reports.
pub struct JestAdapter {
    options: JestAdapterOptions,
    cwd: PathBuf,
}

impl JestAdapter {
    /// Creates an adapter that resolves relative paths against `cwd`.
    pub fn new(options: JestAdapterOptions, cwd: impl Into<PathBuf>) -> Self {
        Self {
            options,
            cwd: cwd.into(),
        }
    }

    /// Returns the adapter's options.
    pub fn options(&self) -> &JestAdapterOptions {
        &self.options
    }

    /// Converts an aggregated result into a report.
    ///
    /// Tests with any status other than `passed` or `failed` (pending, todo,
    /// skipped, disabled) are recorded as not run.
    pub fn convert(&self, results: &JestAggregatedResult) -> Report {
        let files = results
            .test_results
            .iter()
            .map(|file| {
                let tests = file
                    .test_results
                    .iter()
                    .map(JestAssertionResult::to_test_result)
                    .collect();
                FileResult::new(self.render_path(&file.test_file_path), tests)
            })
            .collect();
        Report::new(files)
    }

    /// Parses Jest's JSON output and converts it into a report.
    pub fn convert_json(&self, raw: &[u8]) -> ReportResult<Report> {
        let results: JestAggregatedResult = serde_json::from_slice(raw)?;
        Ok(self.convert(&results))
    }

    /// Converts the results and writes the report to the configured output path.
    pub fn on_run_complete(&self, results: &JestAggregatedResult) -> ReportResult<Report> {
        let report = self.convert(results);
        write_report(&self.options.output_path, &report)?;
        Ok(report)
    }

    fn render_path(&self, test_file_path: &str) -> String {
        if self.options.path_mode == PathMode::KeepAsIs {
            return test_file_path.to_string();
        }

        let real = match std::fs::canonicalize(test_file_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!("Could not resolve test file {}: {}", test_file_path, e);
                return PATH_NOT_FOUND.to_string();
            }
        };

        match self.options.path_mode {
            PathMode::Relative => relativize(&real, &self.cwd),
            _ => real.to_string_lossy().to_string(),
        }
    }
}

/// Replaces the `cwd` prefix of `path` with `.`; paths outside `cwd` stay absolute.
fn relativize(path: &Path, cwd: &Path) -> String {
    let cwd = std::fs::canonicalize(cwd).unwrap_or_else(|_| cwd.to_path_buf());
    match path.strip_prefix(&cwd) {
        Ok(rest) => Path::new(".").join(rest).to_string_lossy().to_string(),
        Err(_) => path.to_string_lossy().to_string(),
    }
}
