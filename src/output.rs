//! Output mode resolution.
//!
//! Rules, in order:
//! 1. An explicit request is honoured, unless it asks to load into a daemon
//!    that can't take the image.
//! 2. No request on a native build with a reachable daemon: load.
//! 3. Anything else: an OCI directory, which needs no daemon import.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::BuildError;
use crate::platform::PlatformSpec;
use crate::probe::BuildEnvironment;
use crate::target::Target;

/// Form of the build result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Register the image with the local daemon.
    Load,
    /// Portable OCI image layout directory.
    OciDir,
    /// Single-file image archive.
    Tar,
}

impl OutputMode {
    /// Combine `--output` with the deprecated `EXPORT_TAR` flag.
    ///
    /// The explicit option wins. `EXPORT_TAR` is the only accepted synonym.
    pub fn normalize(explicit: Option<Self>, legacy_export_tar: bool) -> Option<Self> {
        if explicit.is_none() && legacy_export_tar {
            tracing::warn!("EXPORT_TAR is deprecated, use --output tar");
            return Some(Self::Tar);
        }
        explicit
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::OciDir => "oci",
            Self::Tar => "tar",
        })
    }
}

/// Where the build result ends up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// Image reference registered with the local daemon.
    Image(String),
    /// OCI layout directory.
    Directory(PathBuf),
    /// Image archive file.
    Archive(PathBuf),
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(name) => write!(f, "image {}", name),
            Self::Directory(path) => write!(f, "{}/", path.display()),
            Self::Archive(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolved output for one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    pub mode: OutputMode,
    /// `<target>-<arch>`; the image reference and the artifact file stem.
    pub name: String,
    pub artifact: Artifact,
}

impl OutputSpec {
    pub fn new(mode: OutputMode, target: Target, platform: &PlatformSpec, output_dir: &Path) -> Self {
        let name = format!("{}-{}", target, platform.arch);
        let artifact = match mode {
            OutputMode::Load => Artifact::Image(name.clone()),
            OutputMode::OciDir => Artifact::Directory(output_dir.join(format!("{}.oci", name))),
            OutputMode::Tar => Artifact::Archive(output_dir.join(format!("{}.tar", name))),
        };
        Self { mode, name, artifact }
    }

    /// Exporting to a directory or archive needs the multi-platform extension
    /// on the daemon path.
    pub fn requires_extension(&self) -> bool {
        matches!(self.mode, OutputMode::OciDir | OutputMode::Tar)
    }
}

/// Resolve the output mode for a build.
pub fn resolve_output(
    requested: Option<OutputMode>,
    platform: &PlatformSpec,
    env: &BuildEnvironment,
    remote_builder: bool,
    target: Target,
    output_dir: &Path,
) -> Result<OutputSpec, BuildError> {
    let mode = match requested {
        Some(OutputMode::Load) => {
            if remote_builder {
                return Err(BuildError::IncompatibleOutput(
                    "a remote builder cannot load images into the local daemon".to_string(),
                ));
            }
            if !env.daemon_reachable {
                return Err(BuildError::IncompatibleOutput(
                    "load requires a reachable build daemon".to_string(),
                ));
            }
            if platform.cross && !env.can_load_foreign(platform.arch) {
                return Err(BuildError::IncompatibleOutput(format!(
                    "the daemon on this {} host cannot load {} images (use --output oci or tar)",
                    platform.host, platform.arch
                )));
            }
            OutputMode::Load
        }
        Some(mode) => mode,
        None if !platform.cross && env.daemon_reachable && !remote_builder => OutputMode::Load,
        None => OutputMode::OciDir,
    };

    Ok(OutputSpec::new(mode, target, platform, output_dir))
}
