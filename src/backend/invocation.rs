//! Rendering a chosen execution path into a backend command.
//!
//! Backends, by path:
//! - daemon, single platform: `docker build`
//! - daemon, multi-platform: `docker buildx build`
//! - rootless fallback: `buildctl-daemonless.sh build`
//! - remote: `buildctl --addr <endpoint> build`
//!
//! Every backend is given the requested target stage, which makes it build
//! the whole chain up to that stage.

use std::path::{Path, PathBuf};

use crate::cache::CachePolicy;
use crate::config::{Config, JobCount};
use crate::output::{Artifact, OutputMode, OutputSpec};
use crate::platform::PlatformSpec;
use crate::probe::{BUILDCTL, DOCKER, ROOTLESS_BUILDER};
use crate::process::Cmd;
use crate::target::Target;

use super::ExecutionPath;

/// Build argument carrying the compile parallelism.
pub const JOBS_BUILD_ARG: &str = "JOBS";

/// Everything a backend invocation is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct BuildPlan<'a> {
    pub target: Target,
    pub platform: &'a PlatformSpec,
    pub cache: &'a CachePolicy,
    pub output: &'a OutputSpec,
    pub jobs: Option<JobCount>,
    /// Named buildx builder to use instead of the active one.
    pub builder: Option<&'a str>,
    /// Ask the backend for verbose progress output.
    pub debug: bool,
    pub config: &'a Config,
}

/// Backend command for `path`.
pub fn command(path: &ExecutionPath, plan: &BuildPlan<'_>) -> Cmd {
    match path {
        ExecutionPath::Daemon {
            multi_platform: false,
        } => docker_build(plan),
        ExecutionPath::Daemon {
            multi_platform: true,
        } => buildx_build(plan),
        ExecutionPath::Fallback => buildctl_build(Cmd::new(ROOTLESS_BUILDER), plan),
        ExecutionPath::Remote { endpoint } => {
            buildctl_build(Cmd::new(BUILDCTL).args(["--addr", endpoint.as_str()]), plan)
        }
    }
}

/// `docker build`, always loads into the daemon.
fn docker_build(plan: &BuildPlan<'_>) -> Cmd {
    let mut cmd = Cmd::new(DOCKER).arg("build");
    if plan.debug {
        cmd = cmd.arg("--progress=plain");
    }
    cmd = cmd
        .args(["--target", plan.target.name()])
        .args(["-t", plan.output.name.as_str()]);
    if plan.cache.no_cache() {
        cmd = cmd.arg("--no-cache");
    }
    if let Some(jobs) = plan.jobs {
        cmd = cmd.arg("--build-arg").arg(format!("{}={}", JOBS_BUILD_ARG, jobs));
    }
    cmd.arg("-f")
        .arg_path(&plan.config.dockerfile)
        .arg_path(&plan.config.context)
}

/// `docker buildx build` for cross builds, exports and cache export.
fn buildx_build(plan: &BuildPlan<'_>) -> Cmd {
    let mut cmd = Cmd::new(DOCKER)
        .args(["buildx", "build"])
        .args(["--platform", plan.platform.arch.platform().as_str()])
        .args(["--target", plan.target.name()]);
    if let Some(builder) = plan.builder {
        cmd = cmd.args(["--builder", builder]);
    }
    if plan.debug {
        cmd = cmd.arg("--progress=plain");
    }
    if plan.cache.no_cache() {
        cmd = cmd.arg("--no-cache");
    }
    for source in &plan.cache.sources {
        cmd = cmd.args(["--cache-from", source.as_str()]);
    }
    for destination in &plan.cache.destinations {
        cmd = cmd.args(["--cache-to", destination.as_str()]);
    }
    if let Some(jobs) = plan.jobs {
        cmd = cmd.arg("--build-arg").arg(format!("{}={}", JOBS_BUILD_ARG, jobs));
    }
    cmd = match plan.output.mode {
        OutputMode::Load => cmd.arg("--load").args(["-t", plan.output.name.as_str()]),
        OutputMode::OciDir | OutputMode::Tar => cmd.arg("--output").arg(exporter(plan.output)),
    };
    cmd.arg("-f")
        .arg_path(&plan.config.dockerfile)
        .arg_path(&plan.config.context)
}

/// `buildctl build` through the rootless wrapper or against a remote endpoint.
fn buildctl_build(base: Cmd, plan: &BuildPlan<'_>) -> Cmd {
    let mut cmd = base;
    if plan.debug {
        cmd = cmd.arg("--debug");
    }
    let (dockerfile_dir, dockerfile_name) = split_dockerfile(&plan.config.dockerfile);

    cmd = cmd
        .arg("build")
        .args(["--frontend", "dockerfile.v0"])
        .arg("--local")
        .arg(format!("context={}", plan.config.context.display()))
        .arg("--local")
        .arg(format!("dockerfile={}", dockerfile_dir.display()))
        .arg("--opt")
        .arg(format!("filename={}", dockerfile_name))
        .arg("--opt")
        .arg(format!("target={}", plan.target))
        .arg("--opt")
        .arg(format!("platform={}", plan.platform.arch.platform()));
    if let Some(jobs) = plan.jobs {
        cmd = cmd
            .arg("--opt")
            .arg(format!("build-arg:{}={}", JOBS_BUILD_ARG, jobs));
    }
    if plan.debug {
        cmd = cmd.args(["--progress", "plain"]);
    }
    if plan.cache.no_cache() {
        cmd = cmd.arg("--no-cache");
    }
    for source in &plan.cache.sources {
        cmd = cmd.args(["--import-cache", source.as_str()]);
    }
    for destination in &plan.cache.destinations {
        cmd = cmd.args(["--export-cache", destination.as_str()]);
    }
    cmd.arg("--output").arg(exporter(plan.output))
}

/// Exporter descriptor shared by buildx and buildctl.
fn exporter(output: &OutputSpec) -> String {
    match &output.artifact {
        Artifact::Directory(dir) => format!(
            "type=oci,name={},dest={},tar=false",
            output.name,
            dir.display()
        ),
        Artifact::Archive(file) => {
            format!("type=docker,name={},dest={}", output.name, file.display())
        }
        // Load never reaches a daemonless backend; keep the image in the builder store.
        Artifact::Image(name) => format!("type=image,name={}", name),
    }
}

fn split_dockerfile(dockerfile: &Path) -> (PathBuf, String) {
    let dir = match dockerfile.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = dockerfile
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Dockerfile".to_string());
    (dir, name)
}
