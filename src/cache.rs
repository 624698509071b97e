//! Cache policy selection.
//!
//! Pure: maps the requested cache mode and the probed environment to the
//! cache source and destination descriptors the backend receives. Each
//! backend renders the descriptors with its own flag names.

use std::path::Path;

use serde::Serialize;

use crate::platform::PlatformSpec;
use crate::probe::BuildEnvironment;
use crate::target::Target;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Disable all caching.
    None,
    /// Local cache, as rich as the environment allows.
    Default,
    /// Import and export cache through a registry reference.
    Registry(String),
}

/// Concrete cache arguments for one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachePolicy {
    pub mode: CacheMode,
    /// Cache import descriptors, e.g. `type=local,src=...`.
    pub sources: Vec<String>,
    /// Cache export descriptors, e.g. `type=local,dest=...,mode=max`.
    pub destinations: Vec<String>,
}

impl CachePolicy {
    /// Backend must be told to ignore its layer cache.
    pub fn no_cache(&self) -> bool {
        self.mode == CacheMode::None
    }

    /// Cache import/export needs the multi-platform extension on the daemon path.
    pub fn requires_extension(&self) -> bool {
        !self.sources.is_empty() || !self.destinations.is_empty()
    }
}

/// Cache scope shared by every build of the same target and architecture.
fn scope(target: Target, platform: &PlatformSpec) -> String {
    format!("{}-{}", target, platform.arch)
}

/// Compute the cache policy. Performs no I/O.
pub fn select_cache(
    mode: &CacheMode,
    env: &BuildEnvironment,
    target: Target,
    platform: &PlatformSpec,
    cache_dir: &Path,
) -> CachePolicy {
    let (sources, destinations) = match mode {
        CacheMode::None => (Vec::new(), Vec::new()),
        // The builder's own layer cache needs no arguments. The `docker`
        // driver can't export a local cache, so it gets the same.
        CacheMode::Default if !env.multi_platform_available || env.docker_driver() => {
            (Vec::new(), Vec::new())
        }
        CacheMode::Default => {
            let dir = cache_dir.join(scope(target, platform));
            let dir = dir.display();
            (
                vec![format!("type=local,src={}", dir)],
                vec![format!("type=local,dest={},mode=max", dir)],
            )
        }
        CacheMode::Registry(reference) => {
            let reference = format!("{}:{}", reference, scope(target, platform));
            (
                vec![format!("type=registry,ref={}", reference)],
                vec![format!("type=registry,ref={},mode=max", reference)],
            )
        }
    };

    CachePolicy {
        mode: mode.clone(),
        sources,
        destinations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::resolve_platform;

    fn env(multi_platform: bool) -> BuildEnvironment {
        BuildEnvironment {
            daemon_reachable: true,
            multi_platform_available: multi_platform,
            ..Default::default()
        }
    }

    #[test]
    fn test_none_disables_everything() {
        let platform = resolve_platform(false, "x86_64").unwrap();
        for multi in [false, true] {
            let policy = select_cache(
                &CacheMode::None,
                &env(multi),
                Target::RContainer,
                &platform,
                Path::new(".buildcache"),
            );
            assert!(policy.no_cache());
            assert!(policy.sources.is_empty());
            assert!(policy.destinations.is_empty());
            assert!(!policy.requires_extension());
        }
    }

    #[test]
    fn test_default_without_extension_uses_layer_cache() {
        let platform = resolve_platform(false, "x86_64").unwrap();
        let policy = select_cache(
            &CacheMode::Default,
            &env(false),
            Target::RContainer,
            &platform,
            Path::new(".buildcache"),
        );
        assert!(!policy.no_cache());
        assert!(!policy.requires_extension());
    }

    #[test]
    fn test_default_with_extension_exports_local_pair() {
        let platform = resolve_platform(true, "arm64").unwrap();
        let policy = select_cache(
            &CacheMode::Default,
            &env(true),
            Target::FullContainer,
            &platform,
            Path::new("/cache"),
        );
        assert_eq!(
            policy.sources,
            vec!["type=local,src=/cache/full-container-amd64"]
        );
        assert_eq!(
            policy.destinations,
            vec!["type=local,dest=/cache/full-container-amd64,mode=max"]
        );
        assert!(policy.requires_extension());
    }

    #[test]
    fn test_default_under_docker_driver_exports_nothing() {
        let platform = resolve_platform(false, "x86_64").unwrap();
        let env = BuildEnvironment {
            builder_driver: Some("docker".to_string()),
            ..env(true)
        };
        let policy = select_cache(
            &CacheMode::Default,
            &env,
            Target::RContainer,
            &platform,
            Path::new(".buildcache"),
        );
        assert!(policy.destinations.is_empty());
        assert!(!policy.requires_extension());

        let env = BuildEnvironment {
            builder_driver: Some("docker-container".to_string()),
            ..env
        };
        let policy = select_cache(
            &CacheMode::Default,
            &env,
            Target::RContainer,
            &platform,
            Path::new(".buildcache"),
        );
        assert_eq!(policy.destinations.len(), 1);
    }

    #[test]
    fn test_registry_pair() {
        let platform = resolve_platform(false, "aarch64").unwrap();
        let policy = select_cache(
            &CacheMode::Registry("ghcr.io/org/cache".to_string()),
            &env(false),
            Target::RContainer,
            &platform,
            Path::new(".buildcache"),
        );
        assert_eq!(
            policy.sources,
            vec!["type=registry,ref=ghcr.io/org/cache:r-container-arm64"]
        );
        assert_eq!(
            policy.destinations,
            vec!["type=registry,ref=ghcr.io/org/cache:r-container-arm64,mode=max"]
        );
        assert!(policy.requires_extension());
    }
}
