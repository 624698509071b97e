//! Configuration management for rcbuild.
//!
//! Collects every environment-driven setting into one immutable [`Config`]
//! at startup. `main` loads `.env` first, so environment variables set in the
//! shell take precedence over the file.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::BuildError;

/// Buildx release installed when auto-install is permitted.
pub const DEFAULT_BUILDX_VERSION: &str = "v0.17.1";

/// Probe timeout when `PROBE_TIMEOUT_SECS` is unset.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Compile parallelism forwarded opaquely to the package installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCount(NonZeroU32);

impl JobCount {
    pub fn parse(raw: &str) -> Result<Self, BuildError> {
        raw.trim()
            .parse::<NonZeroU32>()
            .map(Self)
            .map_err(|_| BuildError::InvalidJobCount(raw.to_string()))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for JobCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// rcbuild configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Build context directory (default: .)
    pub context: PathBuf,
    /// Dockerfile path (default: Dockerfile)
    pub dockerfile: PathBuf,
    /// Where OCI directories and archives land (default: output)
    pub output_dir: PathBuf,
    /// Local cache export directory (default: .buildcache)
    pub cache_dir: PathBuf,
    /// Raw `BUILD_JOBS`; validated as a [`JobCount`] with the build request
    /// so `--jobs` can override a bad value
    pub build_jobs: Option<String>,
    /// Deprecated synonym for `--output tar`
    pub legacy_export_tar: bool,
    /// Permit installing the buildx plugin when it is missing
    pub auto_install_buildx: bool,
    /// Remote BuildKit endpoint; overrides daemon and fallback selection
    pub remote_builder: Option<String>,
    /// Registry reference for registry-backed caching
    pub cache_registry: Option<String>,
    pub probe_timeout: Duration,
    pub buildx_version: String,
    /// Docker CLI plugin directory used by the buildx install step
    pub plugin_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            dockerfile: PathBuf::from("Dockerfile"),
            output_dir: PathBuf::from("output"),
            cache_dir: PathBuf::from(".buildcache"),
            build_jobs: None,
            legacy_export_tar: false,
            auto_install_buildx: false,
            remote_builder: None,
            cache_registry: None,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            buildx_version: DEFAULT_BUILDX_VERSION.to_string(),
            plugin_dir: default_plugin_dir(None),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Build configuration from a set of variables.
    ///
    /// Never fails: malformed values fall back to their defaults, except
    /// `BUILD_JOBS`, which is kept as given and checked when a build uses it.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().trim_matches('"').trim_matches('\''))
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let probe_timeout = get("PROBE_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.probe_timeout);

        Self {
            context: get("BUILD_CONTEXT").map(PathBuf::from).unwrap_or(defaults.context),
            dockerfile: get("DOCKERFILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.dockerfile),
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            cache_dir: get("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir),
            build_jobs: get("BUILD_JOBS").map(str::to_string),
            legacy_export_tar: get("EXPORT_TAR").is_some_and(parse_flag),
            auto_install_buildx: get("AUTO_INSTALL_BUILDX").is_some_and(parse_flag),
            remote_builder: get("BUILDKIT_HOST").map(str::to_string),
            cache_registry: get("CACHE_REGISTRY").map(str::to_string),
            probe_timeout,
            buildx_version: get("BUILDX_VERSION")
                .map(str::to_string)
                .unwrap_or(defaults.buildx_version),
            plugin_dir: default_plugin_dir(get("DOCKER_CONFIG")),
        }
    }

    /// Job count for a build: `--jobs` when given, else `BUILD_JOBS`.
    pub fn job_count(&self, requested: Option<&str>) -> Result<Option<JobCount>, BuildError> {
        requested
            .or(self.build_jobs.as_deref())
            .map(JobCount::parse)
            .transpose()
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  BUILD_CONTEXT: {}", self.context.display());
        println!("  DOCKERFILE: {}", self.dockerfile.display());
        println!("  OUTPUT_DIR: {}", self.output_dir.display());
        println!("  CACHE_DIR: {}", self.cache_dir.display());
        match self.build_jobs.as_deref() {
            Some(raw) if JobCount::parse(raw).is_ok() => println!("  BUILD_JOBS: {}", raw),
            Some(raw) => println!("  BUILD_JOBS: {} (INVALID, builds will fail)", raw),
            None => println!("  BUILD_JOBS: (backend default)"),
        }
        println!("  BUILDKIT_HOST: {}", self.remote_builder.as_deref().unwrap_or("(none)"));
        println!("  CACHE_REGISTRY: {}", self.cache_registry.as_deref().unwrap_or("(none)"));
        println!("  AUTO_INSTALL_BUILDX: {}", self.auto_install_buildx);
        println!("  PROBE_TIMEOUT_SECS: {}", self.probe_timeout.as_secs());
        if self.legacy_export_tar {
            println!("  EXPORT_TAR: set (deprecated, use --output tar)");
        }
        if self.dockerfile.exists() {
            println!("  Dockerfile: FOUND");
        } else {
            println!("  Dockerfile: NOT FOUND");
        }
    }
}

/// Truthy values for boolean environment flags.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_plugin_dir(docker_config: Option<&str>) -> PathBuf {
    let base = match docker_config {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docker"),
    };
    base.join("cli-plugins")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new());
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.build_jobs, None);
        assert!(!config.legacy_export_tar);
        assert!(!config.auto_install_buildx);
        assert!(config.remote_builder.is_none());
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(config.plugin_dir.ends_with(".docker/cli-plugins"));
    }

    #[test]
    fn test_job_count_must_be_positive() {
        assert_eq!(JobCount::parse("8").unwrap().get(), 8);
        assert!(JobCount::parse("0").is_err());
        assert!(JobCount::parse("-2").is_err());
        assert!(JobCount::parse("four").is_err());

    }

    #[test]
    fn test_bad_build_jobs_only_fails_builds() {
        let config = Config::from_vars(&vars(&[("BUILD_JOBS", "0")]));
        assert_eq!(config.build_jobs.as_deref(), Some("0"));

        assert_eq!(
            config.job_count(None).unwrap_err(),
            BuildError::InvalidJobCount("0".to_string())
        );
        assert_eq!(config.job_count(Some("3")).unwrap().map(JobCount::get), Some(3));
        assert_eq!(Config::default().job_count(None).unwrap(), None);
    }

    #[test]
    fn test_flags_and_overrides() {
        let config = Config::from_vars(&vars(&[
            ("BUILD_JOBS", "4"),
            ("EXPORT_TAR", "true"),
            ("AUTO_INSTALL_BUILDX", "1"),
            ("BUILDKIT_HOST", "tcp://builder:1234"),
            ("DOCKER_CONFIG", "/tmp/docker"),
            ("PROBE_TIMEOUT_SECS", "not-a-number"),
        ]));

        assert_eq!(config.job_count(None).unwrap().map(JobCount::get), Some(4));
        assert!(config.legacy_export_tar);
        assert!(config.auto_install_buildx);
        assert_eq!(config.remote_builder.as_deref(), Some("tcp://builder:1234"));
        assert_eq!(config.plugin_dir, PathBuf::from("/tmp/docker/cli-plugins"));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_falsy_flags() {
        let config = Config::from_vars(&vars(&[
            ("EXPORT_TAR", "0"),
            ("AUTO_INSTALL_BUILDX", "no"),
            ("BUILDKIT_HOST", ""),
        ]));
        assert!(!config.legacy_export_tar);
        assert!(!config.auto_install_buildx);
        assert!(config.remote_builder.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("CACHE_REGISTRY", "ghcr.io/example/cache");
        let config = Config::from_env();
        std::env::remove_var("CACHE_REGISTRY");

        assert_eq!(
            config.cache_registry.as_deref(),
            Some("ghcr.io/example/cache")
        );
    }
}
