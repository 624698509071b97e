//! Host architecture detection and platform resolution.

use std::fmt;

use serde::Serialize;

use crate::error::BuildError;

/// Architectures the images are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    /// Map a machine name (`uname -m` or Rust's `ARCH`) to an architecture.
    pub fn from_machine(machine: &str) -> Result<Self, BuildError> {
        match machine.trim() {
            "x86_64" | "amd64" => Ok(Self::Amd64),
            "aarch64" | "arm64" => Ok(Self::Arm64),
            other => Err(BuildError::UnsupportedPlatform(format!(
                "architecture '{}' (supported: amd64, arm64)",
                other
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }

    /// Backend platform string, e.g. `linux/amd64`.
    pub fn platform(self) -> String {
        format!("linux/{}", self.name())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved build platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformSpec {
    pub arch: Arch,
    pub host: Arch,
    /// Target architecture differs from the host.
    pub cross: bool,
}

/// Machine name of the running host.
pub fn host_machine() -> &'static str {
    std::env::consts::ARCH
}

/// Resolve the build platform.
///
/// Without `force_amd64` the build is native. Forcing amd64 on an amd64 host
/// is still a native build.
pub fn resolve_platform(force_amd64: bool, host_machine: &str) -> Result<PlatformSpec, BuildError> {
    let host = Arch::from_machine(host_machine)?;
    let arch = if force_amd64 { Arch::Amd64 } else { host };

    Ok(PlatformSpec {
        arch,
        host,
        cross: arch != host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_without_override() {
        let spec = resolve_platform(false, "aarch64").unwrap();
        assert_eq!(spec.arch, Arch::Arm64);
        assert!(!spec.cross);
    }

    #[test]
    fn test_force_same_arch_is_native() {
        for machine in ["x86_64", "amd64"] {
            let spec = resolve_platform(true, machine).unwrap();
            assert_eq!(spec.arch, Arch::Amd64);
            assert!(!spec.cross, "forcing host arch must not cross-build");
        }
    }

    #[test]
    fn test_force_amd64_on_arm64_is_cross() {
        let spec = resolve_platform(true, "arm64").unwrap();
        assert_eq!(spec.arch, Arch::Amd64);
        assert_eq!(spec.host, Arch::Arm64);
        assert!(spec.cross);
    }

    #[test]
    fn test_unsupported_host() {
        let err = resolve_platform(false, "riscv64").unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedPlatform(_)));
        assert!(resolve_platform(true, "s390x").is_err());
    }

    #[test]
    fn test_platform_string() {
        assert_eq!(Arch::Arm64.platform(), "linux/arm64");
        assert_eq!(Arch::Amd64.to_string(), "amd64");
    }
}
