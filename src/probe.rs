//! Point-in-time capability probing.
//!
//! Absence of a capability is a normal state, not an error: every probe that
//! fails, times out or can't start reads as `false`. Probes never retry and
//! never change the host.

use serde::Serialize;

use crate::config::Config;
use crate::platform::Arch;
use crate::process::Cmd;
use crate::runner::Runner;

/// Docker CLI.
pub const DOCKER: &str = "docker";
/// Rootless, daemonless BuildKit wrapper.
pub const ROOTLESS_BUILDER: &str = "buildctl-daemonless.sh";
/// BuildKit client used by the rootless wrapper and remote builders.
pub const BUILDCTL: &str = "buildctl";
/// Buildx driver of the stock builder, backed by the daemon's image store.
pub const DOCKER_DRIVER: &str = "docker";

/// What the host can do, probed once per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildEnvironment {
    pub daemon_reachable: bool,
    /// `docker buildx` is installed and answers.
    pub multi_platform_available: bool,
    /// Platforms the active buildx builder can produce, e.g. `linux/arm64`.
    pub builder_platforms: Vec<String>,
    /// Driver of the active buildx builder, e.g. `docker` or `docker-container`.
    pub builder_driver: Option<String>,
    pub auto_install_permitted: bool,
    /// `buildctl-daemonless.sh` and `buildctl` are both on PATH.
    pub rootless_available: bool,
}

impl BuildEnvironment {
    /// The extension can build `arch` and load the result into the daemon.
    pub fn can_load_foreign(&self, arch: Arch) -> bool {
        self.multi_platform_available
            && self.builder_platforms.iter().any(|p| *p == arch.platform())
    }

    /// The active builder runs on the `docker` driver, which can't export
    /// cache or write OCI layouts and archives.
    pub fn docker_driver(&self) -> bool {
        self.builder_driver.as_deref() == Some(DOCKER_DRIVER)
    }
}

/// Probe everything the backend selector needs.
pub async fn probe<R: Runner>(runner: &R, config: &Config) -> BuildEnvironment {
    let mut env = BuildEnvironment {
        daemon_reachable: probe_daemon(runner, config).await,
        auto_install_permitted: config.auto_install_buildx,
        rootless_available: runner.locate(ROOTLESS_BUILDER).is_some()
            && runner.locate(BUILDCTL).is_some(),
        ..Default::default()
    };
    if env.daemon_reachable {
        probe_extension(runner, config, &mut env).await;
    }
    tracing::debug!(?env, "capabilities probed");
    env
}

/// Lightweight daemon query: `docker info` answering with a server version.
pub async fn probe_daemon<R: Runner>(runner: &R, config: &Config) -> bool {
    if runner.locate(DOCKER).is_none() {
        return false;
    }
    let cmd = Cmd::new(DOCKER).args(["info", "--format", "{{.ServerVersion}}"]);
    match runner.probe(&cmd, config.probe_timeout).await {
        Some(result) => result.success() && !result.stdout_trimmed().is_empty(),
        None => false,
    }
}

/// Check for buildx and record its builder's platforms and driver in `env`.
pub async fn probe_extension<R: Runner>(runner: &R, config: &Config, env: &mut BuildEnvironment) {
    env.builder_platforms.clear();
    env.builder_driver = None;

    let version = Cmd::new(DOCKER).args(["buildx", "version"]);
    env.multi_platform_available = runner
        .probe(&version, config.probe_timeout)
        .await
        .is_some_and(|r| r.success());
    if !env.multi_platform_available {
        return;
    }

    let inspect = Cmd::new(DOCKER).args(["buildx", "inspect"]);
    if let Some(result) = runner.probe(&inspect, config.probe_timeout).await {
        if result.success() {
            env.builder_platforms = parse_platforms(&result.stdout);
            env.builder_driver = parse_driver(&result.stdout);
        }
    }
}

/// Driver of the first builder node in `docker buildx inspect` output.
pub fn parse_driver(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Driver:"))
        .map(str::trim)
        .filter(|driver| !driver.is_empty())
        .map(str::to_string)
}

/// Extract platforms from `docker buildx inspect` output.
///
/// Each node prints a `Platforms:` line; buildx marks explicitly configured
/// platforms with a trailing `*`.
pub fn parse_platforms(output: &str) -> Vec<String> {
    let mut platforms: Vec<String> = Vec::new();
    for line in output.lines() {
        let Some(list) = line.trim().strip_prefix("Platforms:") else {
            continue;
        };
        for platform in list.split(',') {
            let platform = platform.trim().trim_end_matches('*').trim();
            if !platform.is_empty() && !platforms.iter().any(|p| p == platform) {
                platforms.push(platform.to_string());
            }
        }
    }
    platforms
}
