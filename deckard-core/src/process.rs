//! Subprocess seam shared by the forge, tmux and git integrations.
//!
//! Every external command goes through a [`CommandRunner`] so that the
//! integrations can be exercised in tests with a scripted runner, and so that
//! every call carries a bounded timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{trim_output, CoreError, Result};

/// Default timeout for short local commands (git, tmux).
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(10);

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout: LOCAL_TIMEOUT,
        }
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `true` when the argument list starts with `prefix`.
    pub fn args_start_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self { success: true, stdout: stdout.into(), stderr: Vec::new() }
    }

    pub fn failed(stderr: impl Into<Vec<u8>>) -> Self {
        Self { success: false, stdout: Vec::new(), stderr: stderr.into() }
    }

    /// Converts a non-zero exit into [`CoreError::CommandFailed`].
    ///
    /// The detail prefers stderr and falls back to stdout, since several CLIs
    /// report their errors on stdout.
    pub fn into_result(self, program: &str) -> Result<Vec<u8>> {
        if self.success {
            return Ok(self.stdout);
        }
        let raw = if self.stderr.iter().all(u8::is_ascii_whitespace) {
            &self.stdout
        } else {
            &self.stderr
        };
        Err(CoreError::CommandFailed { program: program.to_owned(), detail: trim_output(raw) })
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation to completion or until its timeout elapses.
    ///
    /// A non-zero exit is not an error at this level; spawn failures and
    /// timeouts are.
    async fn run(&self, invocation: Invocation) -> Result<CommandOutput>;
}

/// Runs commands as real child processes via `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: Invocation) -> Result<CommandOutput> {
        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        debug!(program = %invocation.program, args = ?invocation.args, "running command");
        let output = tokio::time::timeout(invocation.timeout, command.output())
            .await
            .map_err(|_| CoreError::Timeout {
                program: invocation.program.clone(),
                after: invocation.timeout,
            })??;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_result_prefers_stderr() {
        let out = CommandOutput { success: false, stdout: b"out".to_vec(), stderr: b"err".to_vec() };
        let err = out.into_result("git").unwrap_err();
        assert_eq!(err.to_string(), "git: err");
    }

    #[test]
    fn into_result_falls_back_to_stdout() {
        let out = CommandOutput { success: false, stdout: b"nothing to commit".to_vec(), stderr: b"\n".to_vec() };
        let err = out.into_result("git").unwrap_err();
        assert_eq!(err.to_string(), "git: nothing to commit");
    }

    #[test]
    fn args_prefix_match() {
        let inv = Invocation::new("tmux", ["-L", "deckard", "has-session", "-t", "x"]);
        assert!(inv.args_start_with(&["-L", "deckard", "has-session"]));
        assert!(!inv.args_start_with(&["-L", "deckard", "new-session"]));
    }

    #[tokio::test]
    async fn process_runner_reports_missing_binary_as_io_error() {
        let result = ProcessRunner
            .run(Invocation::new("deckard-definitely-not-a-binary", Vec::<String>::new()))
            .await;
        assert!(matches!(result, Err(CoreError::Io(_))));
    }
}
