//! Artifact verification.
//!
//! A backend exiting 0 is not proof the artifact exists: the OCI layout must
//! have its index, and the archive must be a non-empty file.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::BuildError;
use crate::output::Artifact;

/// Files every OCI image layout directory contains.
const OCI_LAYOUT_FILES: &[&str] = &["oci-layout", "index.json"];

/// What was found on disk after a successful build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactDetails {
    /// Total size in bytes; None for images loaded into the daemon.
    pub bytes: Option<u64>,
    /// Hex sha256 of archive artifacts.
    pub sha256: Option<String>,
}

/// Check the artifact exists and describe it.
pub fn verify(artifact: &Artifact) -> Result<ArtifactDetails, BuildError> {
    match artifact {
        Artifact::Image(_) => Ok(ArtifactDetails::default()),
        Artifact::Directory(dir) => {
            for file in OCI_LAYOUT_FILES {
                if !dir.join(file).is_file() {
                    return Err(missing(&format!(
                        "OCI layout {} has no {}",
                        dir.display(),
                        file
                    )));
                }
            }
            Ok(ArtifactDetails {
                bytes: Some(dir_size(dir)),
                sha256: None,
            })
        }
        Artifact::Archive(file) => {
            let len = fs::metadata(file)
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .ok_or_else(|| missing(&format!("archive {} was not written", file.display())))?;
            if len == 0 {
                return Err(missing(&format!("archive {} is empty", file.display())));
            }
            let sha256 = hash_file(file)
                .map_err(|e| missing(&format!("failed to read {}: {}", file.display(), e)))?;
            Ok(ArtifactDetails {
                bytes: Some(len),
                sha256: Some(sha256),
            })
        }
    }
}

fn missing(detail: &str) -> BuildError {
    BuildError::BuildFailed {
        code: 0,
        diagnostics: format!("backend reported success but {}", detail),
    }
}

/// Sum of all regular file sizes below `dir`.
pub fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Streaming sha256 of a file.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Human-readable size, as printed in build summaries.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
