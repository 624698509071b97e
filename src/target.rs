//! Build stage chain.
//!
//! The Dockerfile stages form a single chain, from a minimal base up to the
//! full development image:
//!
//! ```text
//! base -> r-packages -> r-container -> latex -> full-container
//! ```
//!
//! `r-container` is the slim image used in CI, `full-container` the full
//! development image. Building a target builds every stage before it, which
//! keeps intermediate stages eligible for cache reuse.

use std::fmt;

use serde::Serialize;

use crate::error::BuildError;

/// A buildable Dockerfile stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum Target {
    Base,
    RPackages,
    RContainer,
    Latex,
    FullContainer,
}

/// One link of the chain.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub target: Target,
    pub predecessor: Option<Target>,
    pub description: &'static str,
}

/// Canonical stage order. Each stage names the one before it.
pub const CHAIN: &[Stage] = &[
    Stage {
        target: Target::Base,
        predecessor: None,
        description: "Minimal OS layer with system libraries",
    },
    Stage {
        target: Target::RPackages,
        predecessor: Some(Target::Base),
        description: "R toolchain and core package set",
    },
    Stage {
        target: Target::RContainer,
        predecessor: Some(Target::RPackages),
        description: "Slim CI image",
    },
    Stage {
        target: Target::Latex,
        predecessor: Some(Target::RContainer),
        description: "LaTeX layers for document rendering",
    },
    Stage {
        target: Target::FullContainer,
        predecessor: Some(Target::Latex),
        description: "Full development image",
    },
];

impl Target {
    /// Stage name as written in the Dockerfile.
    pub fn name(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::RPackages => "r-packages",
            Self::RContainer => "r-container",
            Self::Latex => "latex",
            Self::FullContainer => "full-container",
        }
    }

    /// Parse a stage name. Only exact names are accepted.
    pub fn parse(name: &str) -> Result<Self, BuildError> {
        CHAIN
            .iter()
            .map(|s| s.target)
            .find(|t| t.name() == name)
            .ok_or_else(|| BuildError::UnknownTarget {
                name: name.to_string(),
                expected: CHAIN
                    .iter()
                    .map(|s| s.target.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Position in the canonical chain (root is 0).
    pub fn position(self) -> usize {
        // Every variant appears in CHAIN exactly once.
        CHAIN
            .iter()
            .position(|s| s.target == self)
            .unwrap_or_default()
    }

    /// True for the images users build directly.
    pub fn is_top_level(self) -> bool {
        matches!(self, Self::RContainer | Self::FullContainer)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Target> for &'static str {
    fn from(target: Target) -> Self {
        target.name()
    }
}

/// Stages from the root up to and including `target`.
///
/// The returned iterator borrows the static chain, so it can be cloned and
/// recomputed any number of times with identical results.
pub fn resolve_chain(target: Target) -> impl Iterator<Item = Target> + Clone {
    CHAIN[..=target.position()].iter().map(|s| s.target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_simple() {
        // Root has no predecessor, every other stage points at the previous one.
        assert!(CHAIN[0].predecessor.is_none());
        for pair in CHAIN.windows(2) {
            assert_eq!(pair[1].predecessor, Some(pair[0].target));
        }
    }

    #[test]
    fn test_chain_length_matches_position() {
        for stage in CHAIN {
            let chain: Vec<_> = resolve_chain(stage.target).collect();
            assert_eq!(chain.len(), stage.target.position() + 1);
            assert_eq!(chain.last(), Some(&stage.target));
            assert_eq!(chain.first(), Some(&Target::Base));
        }
    }

    #[test]
    fn test_chain_is_restartable() {
        let chain = resolve_chain(Target::FullContainer);
        let first: Vec<_> = chain.clone().collect();
        let second: Vec<_> = chain.collect();
        assert_eq!(first, second);
        assert_eq!(first, resolve_chain(Target::FullContainer).collect::<Vec<_>>());
    }

    #[test]
    fn test_r_container_chain() {
        let chain: Vec<_> = resolve_chain(Target::RContainer).collect();
        assert_eq!(
            chain,
            vec![Target::Base, Target::RPackages, Target::RContainer]
        );
    }

    #[test]
    fn test_parse_round_trips_names() {
        for stage in CHAIN {
            assert_eq!(Target::parse(stage.target.name()), Ok(stage.target));
        }
    }

    #[test]
    fn test_unknown_target() {
        let err = Target::parse("bogus").unwrap_err();
        assert!(matches!(err, BuildError::UnknownTarget { ref name, .. } if name == "bogus"));
        assert!(err.to_string().contains("full-container"));
        assert!(Target::parse("R-CONTAINER").is_err());
    }

    #[test]
    fn test_top_level_targets() {
        let top: Vec<_> = CHAIN
            .iter()
            .map(|s| s.target)
            .filter(|t| t.is_top_level())
            .collect();
        assert_eq!(top, vec![Target::RContainer, Target::FullContainer]);
    }
}
