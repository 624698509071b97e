//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Build one target image
//! - `preflight` - Report available execution paths
//! - `show` - Display configuration and stages

pub mod build;
mod preflight;
pub mod show;

pub use build::cmd_build;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
