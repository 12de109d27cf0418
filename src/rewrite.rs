//! Runner-specific command rewriting.
//!
//! Given the user's test command and the report of the previous run (if any),
//! [`RunnerKind::rewrite`] produces the command that re-runs only what failed,
//! plus any environment the runner needs to produce a report at all.
//!
//! | Runner | Retry granularity | Override | Environment |
//! |--------|-------------------|----------|-------------|
//! | `jest` | test name | `-t "^name1\|name2$"` | none |
//! | `sled-local` | test file | `-f "path1\|path2"` | `ENABLE_JSON_REPORTER=true` |
//! | `sled-remote` | test file | `-f "path1\|path2"` | `ENABLE_JSON_REPORTER=true`, `KEEP_PATH_AS_IS=true` |
//!
//! Names and paths keep report order and are never de-duplicated.

use crate::config::environment::{ENABLE_JSON_REPORTER_VAR, KEEP_PATH_AS_IS_VAR};
use crate::report::Report;

/// Characters escaped in jest test-name patterns.
const PATTERN_SPECIAL_CHARS: &[char] = &[
    '[', ']', '(', ')', '{', '}', '^', '$', '.', '?', '*', '+', '|', '\\', '"',
];

/// The test-runner integration in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunnerKind {
    /// Jest: retries failed tests by name.
    Jest,
    /// Sled running locally: retries failed files.
    #[value(alias = "sled")]
    SledLocal,
    /// Sled running on remote infrastructure: retries failed files, reported
    /// with literal paths.
    SledRemote,
}

impl std::fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunnerKind::Jest => "jest",
            RunnerKind::SledLocal => "sled-local",
            RunnerKind::SledRemote => "sled-remote",
        };
        f.write_str(name)
    }
}

/// A concrete command line plus the environment to add for the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Shell command to execute.
    pub command: String,

    /// Variables added on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

impl RunnerKind {
    /// Computes the invocation for this runner.
    ///
    /// Without a prior report the user's command is returned unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use test_retry::report::{FileResult, Report, TestResult};
    /// use test_retry::rewrite::RunnerKind;
    ///
    /// let prior = Report::new(vec![FileResult::new(
    ///     "/repo/math.spec.js",
    ///     vec![TestResult::passed("math adds"), TestResult::failed("math divides")],
    /// )]);
    ///
    /// let invocation = RunnerKind::Jest.rewrite("yarn jest", Some(&prior));
    /// assert_eq!(invocation.command, r#"yarn jest -t "^math divides$""#);
    ///
    /// let invocation = RunnerKind::SledLocal.rewrite("sled local", Some(&prior));
    /// assert_eq!(invocation.command, r#"sled local -f "/repo/math.spec.js""#);
    /// ```
    pub fn rewrite(self, user_command: &str, prior: Option<&Report>) -> Invocation {
        match self {
            RunnerKind::Jest => rewrite_by_name(user_command, prior),
            RunnerKind::SledLocal | RunnerKind::SledRemote => {
                rewrite_by_file(user_command, prior, self == RunnerKind::SledRemote)
            }
        }
    }
}

fn rewrite_by_name(user_command: &str, prior: Option<&Report>) -> Invocation {
    let Some(report) = prior else {
        return Invocation {
            command: user_command.to_string(),
            env: Vec::new(),
        };
    };

    // An empty alternation matches nothing, which is acceptable for a report
    // that somehow failed without any failing test.
    let pattern = report
        .failed_tests()
        .map(|t| escape_test_name(&t.full_name))
        .collect::<Vec<_>>()
        .join("|");

    Invocation {
        command: format!("{} -t \"^{}$\"", user_command, pattern),
        env: Vec::new(),
    }
}

fn rewrite_by_file(user_command: &str, prior: Option<&Report>, keep_paths: bool) -> Invocation {
    let mut env = Vec::new();
    if keep_paths {
        env.push((KEEP_PATH_AS_IS_VAR.to_string(), "true".to_string()));
    }
    env.push((ENABLE_JSON_REPORTER_VAR.to_string(), "true".to_string()));

    let command = match prior {
        Some(report) => {
            let files = report
                .failed_files()
                .map(|f| f.path.as_str())
                .collect::<Vec<_>>()
                .join("|");
            format!("{} -f \"{}\"", user_command, files)
        }
        None => user_command.to_string(),
    };

    Invocation { command, env }
}

/// Inserts a backslash before every pattern metacharacter.
///
/// The character itself is kept, so `a.b` becomes `a\.b` and `\` becomes `\\`.
///
/// # Example
///
/// ```
/// use test_retry::rewrite::escape_test_name;
///
/// assert_eq!(escape_test_name("a.b|c"), r"a\.b\|c");
/// assert_eq!(escape_test_name("plain name"), "plain name");
/// ```
pub fn escape_test_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if PATTERN_SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
