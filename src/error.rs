//! Error taxonomy for build invocations.
//!
//! Every failure a build can end in maps to exactly one [`BuildError`]
//! variant. Variants are grouped into categories by [`ErrorKind::category`],
//! which decides the process exit code.

use serde::Serialize;
use thiserror::Error;

/// Errors that end a build invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    // === Validation ===
    #[error("unknown target '{name}' (expected one of: {expected})")]
    UnknownTarget { name: String, expected: String },

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("incompatible output: {0}")]
    IncompatibleOutput(String),

    #[error("invalid job count '{0}': must be a positive integer")]
    InvalidJobCount(String),

    // === Capability ===
    #[error("build daemon unavailable: {0}")]
    DaemonUnavailable(String),

    #[error("multi-platform build extension unavailable: {0}")]
    ExtensionUnavailable(String),

    // === Terminal backend outcomes ===
    #[error("build cancelled")]
    Cancelled { diagnostics: String },

    #[error("build failed (exit code {code})")]
    BuildFailed { code: i32, diagnostics: String },
}

/// Flat discriminant of [`BuildError`], reported in build results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownTarget,
    UnsupportedPlatform,
    IncompatibleOutput,
    InvalidJobCount,
    DaemonUnavailable,
    ExtensionUnavailable,
    Cancelled,
    BuildFailed,
}

/// Coarse grouping used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Detected before any external process starts.
    Validation,
    /// Host lacks a capability the build needs.
    Capability,
    /// The backend ran and reported failure.
    Build,
    Cancelled,
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTarget { .. } => ErrorKind::UnknownTarget,
            Self::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            Self::IncompatibleOutput(_) => ErrorKind::IncompatibleOutput,
            Self::InvalidJobCount(_) => ErrorKind::InvalidJobCount,
            Self::DaemonUnavailable(_) => ErrorKind::DaemonUnavailable,
            Self::ExtensionUnavailable(_) => ErrorKind::ExtensionUnavailable,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::BuildFailed { .. } => ErrorKind::BuildFailed,
        }
    }

    /// Backend output attached to terminal failures, unaltered.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Cancelled { diagnostics } | Self::BuildFailed { diagnostics, .. } => {
                Some(diagnostics.as_str())
            }
            _ => None,
        }
    }
}

impl ErrorKind {
    pub fn category(self) -> Category {
        match self {
            Self::UnknownTarget
            | Self::UnsupportedPlatform
            | Self::IncompatibleOutput
            | Self::InvalidJobCount => Category::Validation,
            Self::DaemonUnavailable | Self::ExtensionUnavailable => Category::Capability,
            Self::BuildFailed => Category::Build,
            Self::Cancelled => Category::Cancelled,
        }
    }

    /// Process exit code for a build ending in this kind of failure.
    pub fn exit_code(self) -> i32 {
        match self.category() {
            Category::Validation => 2,
            Category::Capability => 3,
            Category::Build => 4,
            Category::Cancelled => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        let codes = [
            ErrorKind::UnknownTarget.exit_code(),
            ErrorKind::DaemonUnavailable.exit_code(),
            ErrorKind::BuildFailed.exit_code(),
            ErrorKind::Cancelled.exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(*a, 0);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_validation_kinds_share_exit_code() {
        assert_eq!(ErrorKind::UnknownTarget.exit_code(), 2);
        assert_eq!(ErrorKind::UnsupportedPlatform.exit_code(), 2);
        assert_eq!(ErrorKind::IncompatibleOutput.exit_code(), 2);
        assert_eq!(ErrorKind::InvalidJobCount.exit_code(), 2);
    }

    #[test]
    fn test_diagnostics_only_on_terminal_failures() {
        let failed = BuildError::BuildFailed {
            code: 1,
            diagnostics: "ERROR: process did not complete".to_string(),
        };
        assert_eq!(failed.diagnostics(), Some("ERROR: process did not complete"));
        assert_eq!(
            BuildError::DaemonUnavailable("no socket".to_string()).diagnostics(),
            None
        );
    }
}
