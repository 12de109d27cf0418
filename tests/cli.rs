use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CI_VARS: &[&str] = &[
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
    "SRC_MD5",
    "RUST_LOG",
];

/// The binary in an empty temp dir with no CI markers or fingerprint set.
fn test_retry(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("test-retry").unwrap();
    cmd.current_dir(dir.path());
    for var in CI_VARS {
        cmd.env_remove(var);
    }
    cmd.env("AWS_SHARED_CREDENTIALS_FILE", dir.path().join("no-credentials"));
    cmd
}

#[test]
fn test_missing_command() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .args(["--test-runner", "jest"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "error: missing command to run after \"--\"",
        ));
}

#[test]
fn test_empty_command_after_separator() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .args(["--test-runner", "jest", "--"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing command to run"));
}

#[test]
fn test_invalid_runner_is_usage_error() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .args(["--test-runner", "mocha", "--", "true"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_runner_is_usage_error() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir).args(["--", "true"]).assert().code(1);
}

#[test]
fn test_help_and_version_succeed() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--test-runner"));
    test_retry(&dir).arg("--version").assert().success();
}

#[test]
fn test_disabled_passes_exit_code_through() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .args(["--test-runner", "jest", "--enabled", "false", "--", "exit", "7"])
        .assert()
        .code(7);
}

#[test]
fn test_disabled_by_default_outside_ci() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .args([
            "--test-runner",
            "jest",
            "--",
            "test -z \"$TEST_JSON_REPORTER_OUTPUT_PATH\"",
        ])
        .assert()
        .success();
}

#[test]
fn test_command_arguments_are_joined() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .args(["--test-runner", "sled", "--enabled", "false", "--", "printf", "%s-%s", "a", "b"])
        .assert()
        .success()
        .stdout("a-b");
}

#[test]
fn test_enabled_without_fingerprint_runs_with_reporter_env() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .args([
            "--test-runner",
            "sled-remote",
            "--enabled",
            "--",
            "test -n \"$TEST_JSON_REPORTER_OUTPUT_PATH\" && test \"$KEEP_PATH_AS_IS\" = true",
        ])
        .assert()
        .success();
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    test_retry(&dir)
        .args([
            "--test-runner",
            "jest",
            "--config",
            "absent.toml",
            "--",
            "true",
        ])
        .assert()
        .code(1);
}
