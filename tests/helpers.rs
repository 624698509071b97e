//! Shared test utilities for rcbuild tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use rcbuild::config::Config;
use rcbuild::process::{Cmd, CommandResult, RunOutcome};
use rcbuild::runner::Runner;
use rcbuild::Orchestrator;

/// Test environment with a temporary output directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub config: Config,
}

impl TestEnv {
    /// Create a new test environment with temporary directories.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let config = Config {
            output_dir: base.join("output"),
            cache_dir: base.join("cache"),
            plugin_dir: base.join("docker/cli-plugins"),
            ..Config::default()
        };

        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Orchestrator over `runner` on a host of the given machine type.
    pub fn orchestrator(&self, runner: FakeRunner, host: &str) -> Orchestrator<FakeRunner> {
        Orchestrator::new(runner, self.config.clone()).with_host(host)
    }
}

/// How the fake backend behaves when a build is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildBehavior {
    /// Exit 0 and write the requested artifact.
    Succeed,
    /// Exit 0 without writing anything.
    SucceedWithoutArtifact,
    /// Exit with this code and stderr.
    Fail(i32, String),
    /// Block until cancelled.
    Hang,
}

/// Recording stand-in for the host.
pub struct FakeRunner {
    pub docker_cli: bool,
    pub daemon: bool,
    pub buildx: bool,
    pub platforms: Vec<String>,
    pub rootless: bool,
    /// Driver reported by `docker buildx inspect`.
    pub driver: String,
    pub install_succeeds: bool,
    pub build: BuildBehavior,
    installed: AtomicBool,
    container_builder: AtomicBool,
    probes: Mutex<Vec<String>>,
    runs: Mutex<Vec<Cmd>>,
}

impl FakeRunner {
    /// Docker daemon reachable, no buildx, rootless BuildKit installed.
    pub fn new() -> Self {
        Self {
            docker_cli: true,
            daemon: true,
            buildx: false,
            platforms: Vec::new(),
            rootless: true,
            driver: "docker".to_string(),
            install_succeeds: true,
            build: BuildBehavior::Succeed,
            installed: AtomicBool::new(false),
            container_builder: AtomicBool::new(false),
            probes: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn without_daemon(mut self) -> Self {
        self.daemon = false;
        self
    }

    pub fn without_rootless(mut self) -> Self {
        self.rootless = false;
        self
    }

    /// buildx present, able to produce the given platforms.
    pub fn with_buildx(mut self, platforms: &[&str]) -> Self {
        self.buildx = true;
        self.platforms = platforms.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Platforms buildx reports once it is installed.
    pub fn with_platforms(mut self, platforms: &[&str]) -> Self {
        self.platforms = platforms.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_driver(mut self, driver: &str) -> Self {
        self.driver = driver.to_string();
        self
    }

    /// The `rcbuild` docker-container builder already exists.
    pub fn with_container_builder(self) -> Self {
        self.container_builder.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_build(mut self, build: BuildBehavior) -> Self {
        self.build = build;
        self
    }

    pub fn with_failing_install(mut self) -> Self {
        self.install_succeeds = false;
        self
    }

    /// Command lines of every probe, in order.
    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    /// Every long-running command, in order.
    pub fn runs(&self) -> Vec<Cmd> {
        self.runs.lock().unwrap().clone()
    }

    /// Long-running commands that were not install or builder setup steps.
    pub fn builds(&self) -> Vec<Cmd> {
        self.runs()
            .into_iter()
            .filter(|c| !is_install_step(c) && !is_builder_create(c))
            .collect()
    }

    /// Command lines of every `docker buildx create`.
    pub fn builder_creates(&self) -> Vec<String> {
        self.runs()
            .iter()
            .filter(|c| is_builder_create(c))
            .map(|c| c.to_string())
            .collect()
    }

    pub fn touched_host(&self) -> bool {
        !self.probes().is_empty() || !self.runs().is_empty()
    }

    fn has_buildx(&self) -> bool {
        self.buildx || self.installed.load(Ordering::SeqCst)
    }
}

fn is_install_step(cmd: &Cmd) -> bool {
    matches!(cmd.program(), "mkdir" | "curl" | "chmod")
}

fn is_builder_create(cmd: &Cmd) -> bool {
    cmd.program() == "docker"
        && matches!(cmd.get_args(), [sub, verb, ..] if sub == "buildx" && verb == "create")
}

fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failed(code: i32, stderr: &str) -> CommandResult {
    CommandResult {
        code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

impl Runner for FakeRunner {
    async fn probe(&self, cmd: &Cmd, _timeout: Duration) -> Option<CommandResult> {
        let line = cmd.to_string();
        self.probes.lock().unwrap().push(line.clone());

        match line.as_str() {
            "docker info --format {{.ServerVersion}}" if self.daemon => Some(ok("27.3.1\n")),
            "docker info --format {{.ServerVersion}}" => Some(failed(
                1,
                "Cannot connect to the Docker daemon at unix:///var/run/docker.sock",
            )),
            "docker buildx version" if self.has_buildx() => {
                Some(ok("github.com/docker/buildx v0.17.1 257815a\n"))
            }
            "docker buildx version" => Some(failed(1, "docker: 'buildx' is not a docker command.")),
            "docker buildx inspect" if self.has_buildx() => Some(ok(&format!(
                "Name:   default\nDriver: {}\nPlatforms: {}\n",
                self.driver,
                self.platforms.join(", ")
            ))),
            "docker buildx inspect rcbuild" if self.container_builder.load(Ordering::SeqCst) => {
                Some(ok("Name:   rcbuild\nDriver: docker-container\n"))
            }
            "docker buildx inspect rcbuild" => Some(failed(1, "ERROR: no builder \"rcbuild\" found")),
            _ => None,
        }
    }

    async fn run(&self, cmd: &Cmd, cancel: &CancellationToken) -> Result<RunOutcome> {
        self.runs.lock().unwrap().push(cmd.clone());

        if is_install_step(cmd) {
            if !self.install_succeeds {
                return Ok(RunOutcome::Completed(failed(
                    22,
                    "curl: (22) The requested URL returned error: 404",
                )));
            }
            if cmd.program() == "chmod" {
                self.installed.store(true, Ordering::SeqCst);
            }
            return Ok(RunOutcome::Completed(ok("")));
        }
        if is_builder_create(cmd) {
            self.container_builder.store(true, Ordering::SeqCst);
            return Ok(RunOutcome::Completed(ok("rcbuild\n")));
        }

        match &self.build {
            BuildBehavior::Succeed => {
                write_artifact(cmd)?;
                Ok(RunOutcome::Completed(ok("")))
            }
            BuildBehavior::SucceedWithoutArtifact => Ok(RunOutcome::Completed(ok(""))),
            BuildBehavior::Fail(code, stderr) => Ok(RunOutcome::Completed(failed(*code, stderr))),
            BuildBehavior::Hang => {
                cancel.cancelled().await;
                Ok(RunOutcome::Cancelled {
                    stderr: "#5 [r-packages 2/4] RUN install2.r ...\n".to_string(),
                })
            }
        }
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        let found = match program {
            "docker" => self.docker_cli,
            "buildctl-daemonless.sh" | "buildctl" => self.rootless,
            _ => false,
        };
        found.then(|| PathBuf::from("/usr/bin").join(program))
    }
}

/// Write what the exporter in `--output` asks for.
fn write_artifact(cmd: &Cmd) -> Result<()> {
    let args = cmd.get_args();
    let Some(pos) = args.iter().position(|a| a == "--output") else {
        return Ok(());
    };
    let exporter = &args[pos + 1];
    let field = |key: &str| {
        exporter
            .split(',')
            .find_map(|kv| kv.strip_prefix(key))
            .map(str::to_string)
    };
    let Some(dest) = field("dest=") else {
        return Ok(());
    };
    let dest = PathBuf::from(dest);

    match field("type=").as_deref() {
        Some("oci") => {
            fs::create_dir_all(dest.join("blobs/sha256"))?;
            fs::write(dest.join("oci-layout"), r#"{"imageLayoutVersion":"1.0.0"}"#)?;
            fs::write(dest.join("index.json"), r#"{"schemaVersion":2,"manifests":[]}"#)?;
        }
        Some("docker") => fs::write(&dest, b"fake image archive")?,
        _ => {}
    }
    Ok(())
}
