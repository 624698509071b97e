//! Dedicated `docker-container` buildx builder.
//!
//! The stock buildx builder runs on the `docker` driver. It can load images
//! into the daemon but can't export cache or write OCI layouts and archives.
//! Builds that need either go through a `docker-container` builder, created
//! on first use and reused by later builds.

use tokio_util::sync::CancellationToken;

use crate::cache::CachePolicy;
use crate::config::Config;
use crate::error::BuildError;
use crate::output::OutputSpec;
use crate::probe::{BuildEnvironment, DOCKER};
use crate::process::{Cmd, RunOutcome};
use crate::runner::Runner;

use super::ExecutionPath;

/// Name of the builder rcbuild creates and reuses.
pub const CONTAINER_BUILDER: &str = "rcbuild";

/// The chosen buildx build asks for something the `docker` driver can't do.
pub fn container_builder_needed(
    path: &ExecutionPath,
    env: &BuildEnvironment,
    output: &OutputSpec,
    cache: &CachePolicy,
) -> bool {
    matches!(
        path,
        ExecutionPath::Daemon {
            multi_platform: true
        }
    ) && env.docker_driver()
        && (output.requires_extension() || !cache.destinations.is_empty())
}

pub fn inspect_command() -> Cmd {
    Cmd::new(DOCKER).args(["buildx", "inspect", CONTAINER_BUILDER])
}

pub fn create_command() -> Cmd {
    Cmd::new(DOCKER).args([
        "buildx",
        "create",
        "--name",
        CONTAINER_BUILDER,
        "--driver",
        "docker-container",
    ])
}

/// Make sure the container builder exists and return its name.
pub async fn ensure_container_builder<R: Runner>(
    runner: &R,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<&'static str, BuildError> {
    let existing = runner.probe(&inspect_command(), config.probe_timeout).await;
    if existing.is_some_and(|r| r.success()) {
        tracing::debug!("reusing buildx builder {}", CONTAINER_BUILDER);
        return Ok(CONTAINER_BUILDER);
    }

    eprintln!(
        "Creating buildx builder {} (docker-container driver)...",
        CONTAINER_BUILDER
    );
    let cmd = create_command();
    let outcome = runner.run(&cmd, cancel).await.map_err(|e| {
        BuildError::ExtensionUnavailable(format!("failed to create buildx builder: {:#}", e))
    })?;

    match outcome {
        RunOutcome::Completed(result) if result.success() => Ok(CONTAINER_BUILDER),
        RunOutcome::Completed(result) => Err(BuildError::ExtensionUnavailable(format!(
            "'{}' failed (exit code {}): {}",
            cmd,
            result.code,
            result.stderr_trimmed()
        ))),
        RunOutcome::Cancelled { stderr } => Err(BuildError::Cancelled {
            diagnostics: stderr,
        }),
    }
}
