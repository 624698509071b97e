//! Build orchestration.
//!
//! Composes the pieces in dependency order:
//!
//! 1. target, job count and platform validation (before anything touches the host)
//! 2. capability probing
//! 3. backend selection, installing buildx first when permitted and wanted
//! 4. cache policy and output mode
//! 5. backend invocation and artifact verification
//!
//! Progress goes to stderr; stdout is left to the caller's report.
//!
//! The first failure ends the build; nothing is invoked after a validation
//! error. Every outcome is reported as a [`BuildResult`].

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::artifact::{self, ArtifactDetails};
use crate::backend::builder::{container_builder_needed, ensure_container_builder};
use crate::backend::invocation::{self, BuildPlan};
use crate::backend::{self, ExecutionPath};
use crate::cache::{self, CacheMode};
use crate::config::Config;
use crate::error::BuildError;
use crate::output::{self, Artifact, OutputMode};
use crate::platform;
use crate::probe;
use crate::process::RunOutcome;
use crate::report::{BuildResult, Outcome};
use crate::runner::Runner;
use crate::target::{self, Target};
use crate::timing::Timer;

/// Flags that change control flow or verbosity, not what is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFlags {
    /// Daemon absence is a hard failure instead of routing to the rootless builder.
    pub no_fallback: bool,
    /// Verbose backend output.
    pub debug: bool,
}

/// One build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub target: String,
    pub force_amd64: bool,
    pub cache: CacheMode,
    /// Explicit `--output`; None lets the resolver pick.
    pub output: Option<OutputMode>,
    /// `--jobs` override, validated before use.
    pub jobs: Option<String>,
    pub flags: BuildFlags,
}

impl BuildRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            force_amd64: false,
            cache: CacheMode::Default,
            output: None,
            jobs: None,
            flags: BuildFlags::default(),
        }
    }
}

/// Turns build requests into backend invocations.
pub struct Orchestrator<R> {
    runner: R,
    config: Config,
    host_machine: String,
}

/// Partial result filled in as the build progresses.
struct Progress {
    platform: Option<platform::PlatformSpec>,
    stages: Vec<Target>,
    path: Option<ExecutionPath>,
}

impl<R: Runner> Orchestrator<R> {
    pub fn new(runner: R, config: Config) -> Self {
        Self {
            runner,
            config,
            host_machine: platform::host_machine().to_string(),
        }
    }

    /// Override the detected host machine name.
    pub fn with_host(mut self, machine: impl Into<String>) -> Self {
        self.host_machine = machine.into();
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one build. Never panics on build failure; failures are in the result.
    pub async fn build(&self, request: &BuildRequest, cancel: &CancellationToken) -> BuildResult {
        let timer = Timer::start(&format!("Build {}", request.target));
        let mut progress = Progress {
            platform: None,
            stages: Vec::new(),
            path: None,
        };

        let outcome = match self.execute(request, cancel, &mut progress).await {
            Ok((artifact, details)) => Outcome::Success { artifact, details },
            Err(error) => {
                tracing::debug!("build of '{}' failed: {}", request.target, error);
                BuildResult::failure(&error)
            }
        };

        BuildResult {
            target: request.target.clone(),
            platform: progress.platform,
            stages: progress.stages,
            path: progress.path,
            outcome,
            elapsed: timer.finish(),
        }
    }

    async fn execute(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) -> Result<(Artifact, ArtifactDetails), BuildError> {
        // Validation: nothing below this block may start a process.
        let target = Target::parse(&request.target)?;
        progress.stages = target::resolve_chain(target).collect();
        let jobs = self.config.job_count(request.jobs.as_deref())?;
        let platform = platform::resolve_platform(request.force_amd64, &self.host_machine)?;
        progress.platform = Some(platform);

        eprintln!(
            "Building {} for {}{}...",
            target,
            platform.arch.platform(),
            if platform.cross { " (cross)" } else { "" }
        );

        let mut env = probe::probe(&self.runner, &self.config).await;
        let requested_output = OutputMode::normalize(request.output, self.config.legacy_export_tar);

        // Selection runs first so a permitted buildx install is in place
        // before output and cache are decided from the environment.
        let path = backend::select_path(
            &self.runner,
            &self.config,
            &mut env,
            backend::extension_wanted(&platform, requested_output, &request.cache),
            request.flags.no_fallback,
            platform.host,
            cancel,
        )
        .await?;

        let cache = cache::select_cache(
            &request.cache,
            &env,
            target,
            &platform,
            &self.config.cache_dir,
        );
        let output = output::resolve_output(
            requested_output,
            &platform,
            &env,
            self.config.remote_builder.is_some(),
            target,
            &self.config.output_dir,
        )?;
        tracing::debug!(?cache, ?output, "resolved cache and output");

        // Anything that needs buildx here was already covered by
        // `extension_wanted`, or only appears once buildx is present.
        let needs_extension =
            platform.cross || output.requires_extension() || cache.requires_extension();
        let path = match path {
            ExecutionPath::Daemon { .. } => ExecutionPath::Daemon {
                multi_platform: needs_extension,
            },
            other => other,
        };
        progress.path = Some(path.clone());

        let builder = if container_builder_needed(&path, &env, &output, &cache) {
            Some(ensure_container_builder(&self.runner, &self.config, cancel).await?)
        } else {
            None
        };

        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled {
                diagnostics: String::new(),
            });
        }
        prepare_output_dir(&output.artifact)?;

        let plan = BuildPlan {
            target,
            platform: &platform,
            cache: &cache,
            output: &output,
            jobs,
            builder,
            debug: request.flags.debug,
            config: &self.config,
        };
        let cmd = invocation::command(&path, &plan);

        let outcome = self
            .runner
            .run(&cmd, cancel)
            .await
            .map_err(|e| BuildError::BuildFailed {
                code: -1,
                diagnostics: format!("{:#}", e),
            })?;

        match outcome {
            RunOutcome::Completed(result) if result.success() => {}
            RunOutcome::Completed(result) => {
                return Err(BuildError::BuildFailed {
                    code: result.code,
                    diagnostics: result.stderr,
                });
            }
            RunOutcome::Cancelled { stderr } => {
                return Err(BuildError::Cancelled {
                    diagnostics: stderr,
                });
            }
        }

        let details = artifact::verify(&output.artifact)?;
        Ok((output.artifact, details))
    }
}

/// Make sure the parent directory of a file artifact exists.
fn prepare_output_dir(artifact: &Artifact) -> Result<(), BuildError> {
    let parent = match artifact {
        Artifact::Image(_) => return Ok(()),
        Artifact::Directory(path) | Artifact::Archive(path) => path.parent(),
    };
    match parent {
        Some(dir) if dir != Path::new("") => {
            std::fs::create_dir_all(dir).map_err(|e| BuildError::BuildFailed {
                code: -1,
                diagnostics: format!("failed to create {}: {}", dir.display(), e),
            })
        }
        _ => Ok(()),
    }
}
