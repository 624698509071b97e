//! Preflight checks for container builds.
//!
//! Reports which execution paths the host can offer before a build starts.
//! Run with `rcbuild preflight` to check everything is ready.

mod types;
mod validators;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::platform::Arch;
use crate::probe::{self, BuildEnvironment, BUILDCTL, DOCKER, ROOTLESS_BUILDER};
use crate::runner::Runner;

pub use types::{CheckResult, CheckStatus, PreflightReport};
pub use validators::{dockerfile_stages, validate_dockerfile};

/// Run all preflight checks.
pub async fn run_preflight<R: Runner>(
    runner: &R,
    config: &Config,
    host_machine: &str,
) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    println!("Probing build capabilities...");
    let env = probe::probe(runner, config).await;
    checks.extend(check_capabilities(runner, config, host_machine, &env));

    println!("Checking build inputs...");
    checks.extend(check_inputs(config));

    println!();

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub async fn run_preflight_or_fail<R: Runner>(
    runner: &R,
    config: &Config,
    host_machine: &str,
) -> Result<()> {
    let report = run_preflight(runner, config, host_machine).await;
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before building.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}

/// Turn probed capabilities into checks.
pub fn check_capabilities<R: Runner>(
    runner: &R,
    config: &Config,
    host_machine: &str,
    env: &BuildEnvironment,
) -> Vec<CheckResult> {
    let mut results = Vec::new();

    match Arch::from_machine(host_machine) {
        Ok(arch) => results.push(CheckResult::pass_with("host architecture", arch.name())),
        Err(e) => results.push(CheckResult::fail("host architecture", e.to_string())),
    }

    match runner.locate(DOCKER) {
        Some(path) => results.push(CheckResult::pass_with("docker CLI", path.display().to_string())),
        None => results.push(CheckResult::warn("docker CLI", "Not found in PATH")),
    }

    if env.daemon_reachable {
        results.push(CheckResult::pass("docker daemon"));
    } else {
        results.push(CheckResult::warn(
            "docker daemon",
            "Not reachable - builds use the rootless fallback unless --no-fallback is set",
        ));
    }

    if env.multi_platform_available {
        let platforms = if env.builder_platforms.is_empty() {
            "no platforms reported".to_string()
        } else {
            env.builder_platforms.join(", ")
        };
        let driver = env.builder_driver.as_deref().unwrap_or("unknown");
        results.push(CheckResult::pass_with(
            "docker buildx",
            format!("{} driver; {}", driver, platforms),
        ));
    } else if env.auto_install_permitted {
        results.push(CheckResult::warn(
            "docker buildx",
            format!("Not found - {} will be installed on demand", config.buildx_version),
        ));
    } else {
        results.push(CheckResult::warn(
            "docker buildx",
            "Not found - required for cross builds and oci/tar output. \
             Set AUTO_INSTALL_BUILDX=1 to install it on demand.",
        ));
    }

    if env.rootless_available {
        results.push(CheckResult::pass("rootless builder"));
    } else {
        results.push(CheckResult::warn(
            "rootless builder",
            format!("Not found. Install BuildKit ({} and {}).", ROOTLESS_BUILDER, BUILDCTL),
        ));
    }

    match &config.remote_builder {
        Some(endpoint) => {
            results.push(CheckResult::pass_with("remote builder", endpoint.as_str()))
        }
        None => results.push(CheckResult::skip("remote builder", "BUILDKIT_HOST not set")),
    }

    let any_path =
        config.remote_builder.is_some() || env.daemon_reachable || env.rootless_available;
    if any_path {
        results.push(CheckResult::pass("execution path"));
    } else {
        results.push(CheckResult::fail(
            "execution path",
            "No daemon, no rootless builder and no remote builder available",
        ));
    }

    results
}

/// Check build inputs and the output location.
pub fn check_inputs(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let name = config.dockerfile.display().to_string();

    if config.dockerfile.exists() {
        match validate_dockerfile(&config.dockerfile) {
            Ok(count) => results.push(CheckResult::pass_with(&name, format!("{} stages", count))),
            Err(e) => results.push(CheckResult::fail(&name, e)),
        }
    } else {
        results.push(CheckResult::fail(&name, "Not found - set DOCKERFILE"));
    }

    match config.job_count(None) {
        Ok(Some(jobs)) => results.push(CheckResult::pass_with("BUILD_JOBS", jobs.to_string())),
        Ok(None) => results.push(CheckResult::skip("BUILD_JOBS", "Not set - backend default")),
        Err(e) => results.push(CheckResult::fail("BUILD_JOBS", e.to_string())),
    }

    let output_dir = &config.output_dir;
    let label = format!("{}/ writable", output_dir.display());
    match std::fs::create_dir_all(output_dir) {
        Ok(()) => {
            let probe_file = output_dir.join(".preflight-test");
            match std::fs::write(&probe_file, "test") {
                Ok(()) => {
                    let _ = std::fs::remove_file(&probe_file);
                    results.push(CheckResult::pass(&label));
                }
                Err(e) => results.push(CheckResult::fail(&label, format!("Cannot write: {}", e))),
            }
        }
        Err(e) => results.push(CheckResult::fail(&label, format!("Cannot create: {}", e))),
    }

    results
}
