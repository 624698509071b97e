//! Execution backend selection.
//!
//! Selection is a small state machine:
//!
//! ```text
//! Start -> ProbeCapabilities -> RemoteOverride
//!                            -> DaemonPath
//!                            -> InstallExtension -> ProbeCapabilities
//!                            -> FallbackPath
//!                            -> Fail(DaemonUnavailable | ExtensionUnavailable)
//! ```
//!
//! [`decide`] is the pure transition out of `ProbeCapabilities`;
//! [`select_path`] drives it, performing the install and re-probe when
//! asked to. Once a path is chosen and invoked there is no switching to
//! another path.

pub mod builder;
pub mod install;
pub mod invocation;

use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheMode;
use crate::config::Config;
use crate::error::BuildError;
use crate::output::OutputMode;
use crate::platform::{Arch, PlatformSpec};
use crate::probe::{self, BuildEnvironment};
use crate::runner::Runner;

/// How the build is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionPath {
    /// Remote BuildKit endpoint; bypasses daemon and fallback selection.
    Remote { endpoint: String },
    /// Local daemon, through `docker buildx` when `multi_platform` is set.
    Daemon { multi_platform: bool },
    /// Rootless, daemonless BuildKit.
    Fallback,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { endpoint } => write!(f, "remote builder ({})", endpoint),
            Self::Daemon {
                multi_platform: true,
            } => f.write_str("daemon (buildx)"),
            Self::Daemon {
                multi_platform: false,
            } => f.write_str("daemon"),
            Self::Fallback => f.write_str("rootless fallback"),
        }
    }
}

/// Outcome of one transition out of `ProbeCapabilities`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Path(ExecutionPath),
    /// Install the multi-platform extension, then probe again.
    InstallExtension,
}

/// Inputs the selector decides on.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub env: &'a BuildEnvironment,
    pub remote_builder: Option<&'a str>,
    /// Cross build, OCI/tar export or registry cache was requested.
    pub needs_extension: bool,
    pub no_fallback: bool,
}

/// Whether a request needs buildx on the daemon path.
///
/// Judged from the request alone, before output and cache are resolved, so a
/// permitted install happens before either is decided.
pub fn extension_wanted(
    platform: &PlatformSpec,
    output: Option<OutputMode>,
    cache: &CacheMode,
) -> bool {
    platform.cross
        || matches!(output, Some(OutputMode::OciDir | OutputMode::Tar))
        || matches!(cache, CacheMode::Registry(_))
}

/// Pure selection step.
pub fn decide(selection: &Selection<'_>) -> Result<Decision, BuildError> {
    let env = selection.env;

    if let Some(endpoint) = selection.remote_builder {
        return Ok(Decision::Path(ExecutionPath::Remote {
            endpoint: endpoint.to_string(),
        }));
    }

    if env.daemon_reachable {
        if selection.needs_extension && !env.multi_platform_available {
            if env.auto_install_permitted {
                return Ok(Decision::InstallExtension);
            }
            return Err(BuildError::ExtensionUnavailable(
                "docker buildx is required for this build but not installed \
                 (set AUTO_INSTALL_BUILDX=1 to install it automatically)"
                    .to_string(),
            ));
        }
        return Ok(Decision::Path(ExecutionPath::Daemon {
            multi_platform: selection.needs_extension,
        }));
    }

    if selection.no_fallback {
        return Err(BuildError::DaemonUnavailable(
            "docker daemon is not reachable and --no-fallback is set".to_string(),
        ));
    }
    if !env.rootless_available {
        return Err(BuildError::DaemonUnavailable(format!(
            "docker daemon is not reachable and no rootless builder ({}) was found",
            probe::ROOTLESS_BUILDER
        )));
    }

    Ok(Decision::Path(ExecutionPath::Fallback))
}

/// Run the selection state machine to a chosen path.
///
/// The extension is installed at most once; `env` is updated in place with
/// the re-probed capabilities.
pub async fn select_path<R: Runner>(
    runner: &R,
    config: &Config,
    env: &mut BuildEnvironment,
    needs_extension: bool,
    no_fallback: bool,
    host: Arch,
    cancel: &CancellationToken,
) -> Result<ExecutionPath, BuildError> {
    let mut installed = false;

    loop {
        let selection = Selection {
            env: &*env,
            remote_builder: config.remote_builder.as_deref(),
            needs_extension,
            no_fallback,
        };

        match decide(&selection)? {
            Decision::Path(path) => {
                tracing::info!("execution path: {}", path);
                return Ok(path);
            }
            Decision::InstallExtension if installed => {
                return Err(BuildError::ExtensionUnavailable(
                    "docker buildx still unavailable after installation".to_string(),
                ));
            }
            Decision::InstallExtension => {
                eprintln!("Installing docker buildx {}...", config.buildx_version);
                install::install_extension(runner, config, host, cancel).await?;
                installed = true;
                probe::probe_extension(runner, config, env).await;
            }
        }
    }
}
