//! Centralized command execution with consistent error handling.
//!
//! [`Cmd`] describes an external command. It can be run two ways:
//! - [`Cmd::probe`]: short capability checks, bounded by a timeout, output captured
//! - [`Cmd::run_cancellable`]: long builds, all child output streamed to our
//!   stderr so stdout stays free for reports; stderr is also captured so it
//!   can be attached to failures

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// How long to wait for stderr to drain after killing a cancelled child.
const DRAIN_AFTER_KILL: Duration = Duration::from_secs(2);

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code, or -1 if terminated by signal.
    pub code: i32,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Get stdout, trimmed of whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Outcome of a cancellable run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited on its own.
    Completed(CommandResult),
    /// The cancellation token fired and the process was killed.
    Cancelled { stderr: String },
}

/// Builder for configuring command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// True if `arg` appears verbatim in the argument list.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run to completion with captured output, giving up after `timeout`.
    ///
    /// Returns None if the program can't be started or doesn't finish in
    /// time. A non-zero exit is returned as a result, not as None.
    pub async fn probe(&self, timeout: Duration) -> Option<CommandResult> {
        let output = tokio::time::timeout(timeout, self.command().output()).await;
        match output {
            Ok(Ok(output)) => Some(CommandResult {
                code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => {
                tracing::debug!("probe '{}' could not start: {}", self, e);
                None
            }
            Err(_) => {
                tracing::debug!("probe '{}' timed out after {:?}", self, timeout);
                None
            }
        }
    }

    /// Run with stdout sent to our stderr and stderr streamed through and captured.
    ///
    /// Firing `cancel` kills the child and yields [`RunOutcome::Cancelled`].
    /// Errors only if the program can't be started.
    pub async fn run_cancellable(&self, cancel: &CancellationToken) -> Result<RunOutcome> {
        let mut child = self
            .command()
            .stdout(Stdio::from(std::io::stderr()))
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))?;

        let stderr = child.stderr.take();
        let mut collector = tokio::spawn(async move {
            let mut collected = String::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{}", line);
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            collected
        });

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        match waited {
            Some(status) => {
                let status =
                    status.with_context(|| format!("Failed to wait for '{}'", self.program))?;
                let stderr = (&mut collector).await.unwrap_or_default();
                Ok(RunOutcome::Completed(CommandResult {
                    code: status.code().unwrap_or(-1),
                    stdout: String::new(),
                    stderr,
                }))
            }
            None => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("failed to kill '{}': {}", self.program, e);
                }
                // Grandchildren may hold the pipe open; don't wait on them forever.
                let stderr = match tokio::time::timeout(DRAIN_AFTER_KILL, &mut collector).await {
                    Ok(joined) => joined.unwrap_or_default(),
                    Err(_) => {
                        collector.abort();
                        String::new()
                    }
                };
                Ok(RunOutcome::Cancelled { stderr })
            }
        }
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
