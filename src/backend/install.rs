//! One-time installation of the docker buildx plugin.
//!
//! Only reached when `AUTO_INSTALL_BUILDX` is set. The plugin binary is
//! downloaded into the Docker CLI plugin directory.

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::BuildError;
use crate::platform::Arch;
use crate::process::{Cmd, RunOutcome};
use crate::runner::Runner;

const RELEASE_BASE_URL: &str = "https://github.com/docker/buildx/releases/download";

/// Download URL of the buildx release for `host`.
pub fn release_url(version: &str, host: Arch) -> String {
    format!(
        "{}/{}/buildx-{}.linux-{}",
        RELEASE_BASE_URL, version, version, host
    )
}

/// Commands that install the plugin, in order.
pub fn install_commands(config: &Config, host: Arch) -> Vec<Cmd> {
    let plugin = config.plugin_dir.join("docker-buildx");
    vec![
        Cmd::new("mkdir").arg("-p").arg_path(&config.plugin_dir),
        Cmd::new("curl")
            .args(["-fsSL", "-o"])
            .arg_path(&plugin)
            .arg(release_url(&config.buildx_version, host)),
        Cmd::new("chmod").arg("+x").arg_path(&plugin),
    ]
}

/// Install the plugin. Any failing step makes the extension unavailable.
pub async fn install_extension<R: Runner>(
    runner: &R,
    config: &Config,
    host: Arch,
    cancel: &CancellationToken,
) -> Result<(), BuildError> {
    for cmd in install_commands(config, host) {
        let outcome = runner.run(&cmd, cancel).await.map_err(|e| {
            BuildError::ExtensionUnavailable(format!("buildx installation failed: {:#}", e))
        })?;

        match outcome {
            RunOutcome::Completed(result) if result.success() => {}
            RunOutcome::Completed(result) => {
                return Err(BuildError::ExtensionUnavailable(format!(
                    "buildx installation failed at '{}' (exit code {}): {}",
                    cmd,
                    result.code,
                    result.stderr_trimmed()
                )));
            }
            RunOutcome::Cancelled { stderr } => {
                return Err(BuildError::Cancelled {
                    diagnostics: stderr,
                });
            }
        }
    }

    tracing::info!(
        "installed docker buildx {} into {}",
        config.buildx_version,
        config.plugin_dir.display()
    );
    Ok(())
}
