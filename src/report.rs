//! Build result reported to the caller.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::artifact::{format_bytes, ArtifactDetails};
use crate::backend::ExecutionPath;
use crate::error::{BuildError, ErrorKind};
use crate::output::Artifact;
use crate::platform::PlatformSpec;
use crate::target::Target;
use crate::timing::format_duration;

/// How the build ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        artifact: Artifact,
        details: ArtifactDetails,
    },
    Failure {
        kind: ErrorKind,
        detail: String,
        /// Backend output, unaltered.
        diagnostics: Option<String>,
    },
}

/// Result of one build invocation. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    /// Target as requested, even if it turned out to be unknown.
    pub target: String,
    /// Resolved once the target validated.
    pub platform: Option<PlatformSpec>,
    /// Stages the backend was asked to build, root first.
    pub stages: Vec<Target>,
    /// Path chosen by the backend selector, if selection was reached.
    pub path: Option<ExecutionPath>,
    pub outcome: Outcome,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.outcome {
            Outcome::Failure { kind, .. } => Some(kind),
            Outcome::Success { .. } => None,
        }
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match &self.outcome {
            Outcome::Success { artifact, .. } => Some(artifact),
            Outcome::Failure { .. } => None,
        }
    }

    /// 0 on success, the error category's code otherwise.
    pub fn exit_code(&self) -> i32 {
        self.error_kind().map_or(0, ErrorKind::exit_code)
    }

    pub(crate) fn failure(error: &BuildError) -> Outcome {
        Outcome::Failure {
            kind: error.kind(),
            detail: error.to_string(),
            diagnostics: error.diagnostics().map(str::to_string),
        }
    }

    /// Print the summary to stdout.
    pub fn print(&self) {
        println!("=== Build Result ===\n");
        println!("  Target:   {}", self.target);
        if let Some(platform) = &self.platform {
            let mode = if platform.cross { "cross" } else { "native" };
            println!(
                "  Platform: {} ({}, host {})",
                platform.arch.platform(),
                mode,
                platform.host
            );
        }
        if !self.stages.is_empty() {
            let chain: Vec<_> = self.stages.iter().map(|t| t.name()).collect();
            println!("  Stages:   {}", chain.join(" -> "));
        }
        if let Some(path) = &self.path {
            println!("  Path:     {}", path);
        }
        println!("  Elapsed:  {}", format_duration(self.elapsed));
        println!();

        match &self.outcome {
            Outcome::Success { artifact, details } => {
                print!("  ✓ [PASS] {}", artifact);
                if let Some(bytes) = details.bytes {
                    print!(" ({})", format_bytes(bytes));
                }
                println!();
                if let Some(sha256) = &details.sha256 {
                    println!("    sha256: {}", sha256);
                }
            }
            Outcome::Failure {
                detail,
                diagnostics,
                ..
            } => {
                println!("  ✗ [FAIL] {}", detail);
                if let Some(diagnostics) = diagnostics.as_deref().map(str::trim) {
                    if !diagnostics.is_empty() {
                        println!("\nBackend output:\n{}", diagnostics);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: Outcome) -> BuildResult {
        BuildResult {
            target: "r-container".to_string(),
            platform: None,
            stages: Vec::new(),
            path: None,
            outcome,
            elapsed: Duration::from_millis(2500),
        }
    }

    #[test]
    fn test_success_exit_code() {
        let r = result(Outcome::Success {
            artifact: Artifact::Image("r-container-arm64".to_string()),
            details: ArtifactDetails::default(),
        });
        assert!(r.is_success());
        assert_eq!(r.exit_code(), 0);
        assert_eq!(r.error_kind(), None);
    }

    #[test]
    fn test_failure_carries_diagnostics() {
        let error = BuildError::BuildFailed {
            code: 1,
            diagnostics: "E: Unable to locate package".to_string(),
        };
        let r = result(BuildResult::failure(&error));
        assert_eq!(r.error_kind(), Some(ErrorKind::BuildFailed));
        assert_eq!(r.exit_code(), 4);
        match r.outcome {
            Outcome::Failure { diagnostics, .. } => {
                assert_eq!(diagnostics.as_deref(), Some("E: Unable to locate package"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_json_shape() {
        let r = result(Outcome::Success {
            artifact: Artifact::Image("r-container-arm64".to_string()),
            details: ArtifactDetails::default(),
        });
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["target"], "r-container");
        assert_eq!(json["outcome"]["status"], "success");
        assert_eq!(json["outcome"]["artifact"]["image"], "r-container-arm64");
        assert_eq!(json["elapsed_secs"], 2.5);
    }
}
