//! rcbuild library.
//!
//! Turns a named Dockerfile stage into a platform-correct build invocation.
//! The binary in `main.rs` is a thin CLI over [`orchestrator::Orchestrator`];
//! everything is exported here so `tests/` can drive it with a fake
//! [`runner::Runner`].

pub mod artifact;
pub mod backend;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod platform;
pub mod preflight;
pub mod probe;
pub mod process;
pub mod report;
pub mod runner;
pub mod target;
pub mod timing;

pub use error::{BuildError, ErrorKind};
pub use orchestrator::{BuildFlags, BuildRequest, Orchestrator};
pub use report::{BuildResult, Outcome};
