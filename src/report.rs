//! Normalized test reports.
//!
//! A [`Report`] is the pass/fail summary of one test-runner invocation, written
//! by a reporter adapter to a local JSON file and cached remotely by the
//! orchestrator. Both supported runners produce the same shape, so everything
//! downstream (command rewriting, skip decisions) works on this model only.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "passed": false,
//!   "filesResult": [
//!     {
//!       "passed": false,
//!       "path": "/repo/__tests__/math.spec.js",
//!       "testResults": [
//!         { "didRun": true, "passed": true, "fullName": "math adds" },
//!         { "didRun": true, "passed": false, "fullName": "math divides" },
//!         { "didRun": false, "passed": false, "fullName": "math todo" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Key order is irrelevant. The per-file `passed` flag may be omitted, in which
//! case it is derived from the file's test results.
//!
//! # Adapters
//!
//! | Adapter | Module | Native input |
//! |---------|--------|--------------|
//! | Jest | [`jest`] | Aggregated result object passed to `onRunComplete` |
//! | Jasmine | [`jasmine`] | Finished specs plus the overall status |

pub mod jasmine;
pub mod jest;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use jasmine::{JasmineAdapter, JasmineSpec};
pub use jest::{JestAdapter, JestAdapterOptions, PathMode};

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur while reading or writing reports.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The bytes are not a serialized report.
    ///
    /// Covers invalid JSON as well as valid JSON that is missing `passed`,
    /// `filesResult`, or a file's `path`/`testResults`.
    #[error("Malformed test report: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Failed to read or write a report file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One executed or skipped test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Runner-qualified test name, e.g. `"<describe> <test>"`.
    pub full_name: String,

    /// Whether the runner attempted to execute the test.
    pub did_run: bool,

    /// Whether the test completed successfully. Never true when `did_run` is false.
    pub passed: bool,
}

impl TestResult {
    /// A test that ran and passed.
    pub fn passed(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            did_run: true,
            passed: true,
        }
    }

    /// A test that ran and failed.
    pub fn failed(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            did_run: true,
            passed: false,
        }
    }

    /// A test that was skipped or pending.
    pub fn skipped(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            did_run: false,
            passed: false,
        }
    }

    /// Returns `true` if the test ran and did not pass.
    pub fn is_failure(&self) -> bool {
        self.did_run && !self.passed
    }
}

// A test that did not run never counts as passed, whatever the wire says.
impl<'de> Deserialize<'de> for TestResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            full_name: String,
            did_run: bool,
            passed: bool,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(TestResult {
            full_name: raw.full_name,
            did_run: raw.did_run,
            passed: raw.did_run && raw.passed,
        })
    }
}

/// Test results belonging to one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    /// `true` iff every test either did not run or passed.
    pub passed: bool,

    /// Adapter-defined file identifier. Opaque to the orchestrator.
    pub path: String,

    /// Test results in the order the runner reported them.
    pub test_results: Vec<TestResult>,
}

impl FileResult {
    /// Creates a file result, deriving `passed` from the test results.
    ///
    /// # Example
    ///
    /// ```
    /// use test_retry::report::{FileResult, TestResult};
    ///
    /// let file = FileResult::new(
    ///     "math.spec.js",
    ///     vec![TestResult::passed("adds"), TestResult::skipped("todo")],
    /// );
    /// assert!(file.passed);
    /// ```
    pub fn new(path: impl Into<String>, test_results: Vec<TestResult>) -> Self {
        let passed = test_results.iter().all(|t| !t.is_failure());
        Self {
            passed,
            path: path.into(),
            test_results,
        }
    }

    /// Iterates over the tests in this file that ran and failed.
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.test_results.iter().filter(|t| t.is_failure())
    }
}

// The per-file `passed` flag is optional on the wire.
impl<'de> Deserialize<'de> for FileResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            passed: Option<bool>,
            path: String,
            test_results: Vec<TestResult>,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(match raw.passed {
            Some(passed) => FileResult {
                passed,
                path: raw.path,
                test_results: raw.test_results,
            },
            None => FileResult::new(raw.path, raw.test_results),
        })
    }
}

/// Pass/fail summary of a single test-runner invocation.
///
/// Created once by a reporter adapter and treated as an immutable value
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// `true` iff every file passed. An empty report counts as passed.
    pub passed: bool,

    /// Per-file results in runner order.
    pub files_result: Vec<FileResult>,
}

/// Counts describing a report, used for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSummary {
    pub files: usize,
    pub failed_files: usize,
    pub tests_run: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files ({} failed), {} tests run ({} failed), {} skipped",
            self.files, self.failed_files, self.tests_run, self.failed_tests, self.skipped_tests
        )
    }
}

impl Report {
    /// Creates a report, deriving `passed` from the file results.
    ///
    /// # Example
    ///
    /// ```
    /// use test_retry::report::{FileResult, Report, TestResult};
    ///
    /// let report = Report::new(vec![
    ///     FileResult::new("a.spec.js", vec![TestResult::passed("a")]),
    ///     FileResult::new("b.spec.js", vec![TestResult::failed("b")]),
    /// ]);
    /// assert!(!report.passed);
    /// ```
    pub fn new(files_result: Vec<FileResult>) -> Self {
        let passed = files_result.iter().all(|f| f.passed);
        Self {
            passed,
            files_result,
        }
    }

    /// Parses a serialized report.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Malformed`] if the bytes are not valid JSON or
    /// don't match the report schema.
    ///
    /// # Example
    ///
    /// ```
    /// use test_retry::report::Report;
    ///
    /// let report = Report::parse(br#"{"passed": true, "filesResult": []}"#)?;
    /// assert!(report.passed);
    ///
    /// assert!(Report::parse(b"{}").is_err());
    /// # Ok::<(), test_retry::report::ReportError>(())
    /// ```
    pub fn parse(raw: &[u8]) -> ReportResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Serializes the report to compact JSON.
    pub fn to_json(&self) -> ReportResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reads and parses a report file.
    pub async fn read(path: &Path) -> ReportResult<Self> {
        let raw = tokio::fs::read(path).await?;
        Self::parse(&raw)
    }

    /// Iterates over every test that ran and failed, in report order.
    pub fn failed_tests(&self) -> impl Iterator<Item = &TestResult> {
        self.files_result.iter().flat_map(|f| f.failures())
    }

    /// Iterates over every file that did not pass, in report order.
    pub fn failed_files(&self) -> impl Iterator<Item = &FileResult> {
        self.files_result.iter().filter(|f| !f.passed)
    }

    /// Computes summary counts for logging.
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary {
            files: self.files_result.len(),
            failed_files: self.failed_files().count(),
            ..Default::default()
        };
        for test in self.files_result.iter().flat_map(|f| &f.test_results) {
            if test.did_run {
                summary.tests_run += 1;
                if !test.passed {
                    summary.failed_tests += 1;
                }
            } else {
                summary.skipped_tests += 1;
            }
        }
        summary
    }
}

/// Writes a report as pretty-printed JSON, creating parent directories.
///
/// This is the adapter side of the reporter contract: the orchestrator tells
/// the child where to write via an environment variable and reads the file
/// back once the child exits.
pub fn write_report(path: &Path, report: &Report) -> ReportResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
