//! Child process execution.
//!
//! The orchestrator hands a shell command plus an environment overlay to a
//! [`CommandRunner`] and gets back the exit code. [`ShellRunner`] is the real
//! implementation; tests substitute fakes that never spawn anything.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;

/// Exit code reported for a child that ended without one (killed by a signal).
pub const SIGNALED_EXIT_CODE: i32 = 1;

/// Errors from starting a child process.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The shell could not be started.
    #[error("Failed to spawn '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs a test command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` in `cwd` with `env` added to the inherited environment.
    ///
    /// Returns the child's exit code. A non-zero code is not an error.
    async fn run(
        &self,
        command: &str,
        env: &[(String, String)],
        cwd: &Path,
    ) -> Result<i32, RunnerError>;
}

/// Runs commands through `<shell> -c` with inherited standard streams.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("/bin/sh")
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        env: &[(String, String)],
        cwd: &Path,
    ) -> Result<i32, RunnerError> {
        tracing::debug!("Running: {} -c {}", self.shell, command);

        let mut process = tokio::process::Command::new(&self.shell);
        process.arg("-c").arg(command);
        process.current_dir(cwd);

        for (key, value) in env {
            process.env(key, value);
        }

        process.stdin(Stdio::inherit());
        process.stdout(Stdio::inherit());
        process.stderr(Stdio::inherit());

        let status = process.status().await.map_err(|e| RunnerError::Spawn {
            shell: self.shell.clone(),
            source: e,
        })?;

        Ok(exit_code(status))
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => {
            tracing::warn!("Test command was terminated by a signal ({})", status);
            SIGNALED_EXIT_CODE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_exit_code_passes_through() {
        let temp_dir = TempDir::new().unwrap();
        let runner = ShellRunner::default();

        assert_eq!(runner.run("true", &[], temp_dir.path()).await.unwrap(), 0);
        assert_eq!(runner.run("exit 3", &[], temp_dir.path()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_runs_in_cwd_with_env() {
        let temp_dir = TempDir::new().unwrap();
        let runner = ShellRunner::default();
        let env = vec![("RETRY_TEST_VALUE".to_string(), "hello".to_string())];

        let code = runner
            .run("printf '%s' \"$RETRY_TEST_VALUE\" > out.txt", &env, temp_dir.path())
            .await
            .unwrap();

        assert_eq!(code, 0);
        let written = std::fs::read_to_string(temp_dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn test_signal_maps_to_one() {
        let temp_dir = TempDir::new().unwrap();
        let runner = ShellRunner::default();

        let code = runner.run("kill -9 $$", &[], temp_dir.path()).await.unwrap();
        assert_eq!(code, SIGNALED_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_missing_shell_is_spawn_error() {
        let temp_dir = TempDir::new().unwrap();
        let runner = ShellRunner::new("/nonexistent/shell");

        let result = runner.run("true", &[], temp_dir.path()).await;
        assert!(matches!(result, Err(RunnerError::Spawn { .. })));
    }
}
