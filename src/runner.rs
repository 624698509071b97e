//! The seam between build decisions and the host.
//!
//! Everything that touches external programs goes through [`Runner`], so the
//! decision logic can be exercised against a recording fake.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::process::{Cmd, CommandResult, RunOutcome};

/// Executes external commands on behalf of the orchestrator.
#[allow(async_fn_in_trait)]
pub trait Runner {
    /// Short, bounded capability check. None means "not available".
    async fn probe(&self, cmd: &Cmd, timeout: Duration) -> Option<CommandResult>;

    /// Long-running invocation that honours `cancel`.
    async fn run(&self, cmd: &Cmd, cancel: &CancellationToken) -> Result<RunOutcome>;

    /// Look up a program on PATH.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Runs commands on the real host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    async fn probe(&self, cmd: &Cmd, timeout: Duration) -> Option<CommandResult> {
        tracing::debug!("probe: {}", cmd);
        cmd.probe(timeout).await
    }

    async fn run(&self, cmd: &Cmd, cancel: &CancellationToken) -> Result<RunOutcome> {
        tracing::info!("exec: {}", cmd);
        cmd.run_cancellable(cancel).await
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}
