//! Jasmine reporter adapter.
//!
//! Jasmine reports specs one at a time (`specDone`) and the overall status at
//! the end (`jasmineDone`). Specs carry no file information, so every spec
//! becomes its own file entry with a placeholder path. That makes reports from
//! this adapter usable for name-based retries only.

use std::path::PathBuf;

use serde::Deserialize;

use super::{FileResult, Report, ReportResult, TestResult, write_report};

/// Path recorded for every spec, since Jasmine doesn't expose source files.
pub const UNSPECIFIED_PATH: &str = "not specified";

/// Output file used when none is configured.
pub const DEFAULT_OUTPUT_PATH: &str = "./jasmine-simple-json-reporter-results.json";

/// A finished Jasmine spec (subset of the `specDone` payload).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JasmineSpec {
    pub full_name: String,
    pub status: String,
}

/// Collects finished specs and produces a report when the suite is done.
pub struct JasmineAdapter {
    output_path: PathBuf,
    specs: Vec<JasmineSpec>,
}

impl JasmineAdapter {
    /// Creates an adapter writing to `output_path`, or the default path when `None`.
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self {
            output_path: output_path.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            specs: Vec::new(),
        }
    }

    /// Records one finished spec.
    pub fn spec_done(&mut self, spec: JasmineSpec) {
        self.specs.push(spec);
    }

    /// Builds the report from the collected specs.
    ///
    /// Unlike [`Report::new`], the top-level `passed` flag comes from Jasmine's
    /// overall status, which also accounts for failures outside specs
    /// (e.g. in `afterAll`).
    pub fn build(&self, overall_status: &str) -> Report {
        let files_result = self
            .specs
            .iter()
            .map(|spec| FileResult {
                passed: spec.status == "passed",
                path: UNSPECIFIED_PATH.to_string(),
                test_results: vec![TestResult {
                    full_name: spec.full_name.clone(),
                    did_run: spec.status != "pending",
                    passed: spec.status == "passed",
                }],
            })
            .collect();

        Report {
            passed: overall_status == "passed",
            files_result,
        }
    }

    /// Builds the report and writes it to the output path.
    pub fn jasmine_done(&self, overall_status: &str) -> ReportResult<Report> {
        let report = self.build(overall_status);
        write_report(&self.output_path, &report)?;
        Ok(report)
    }
}
