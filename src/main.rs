//! rcbuild - container image builder for the R development images.
//!
//! Builds one Dockerfile stage per invocation:
//! - through the local docker daemon (plain `docker build` or `buildx`)
//! - through rootless BuildKit when no daemon is reachable
//! - through a remote BuildKit endpoint when `BUILDKIT_HOST` is set

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;

use rcbuild::cache::CacheMode;
use rcbuild::commands::{self, build::ReportFormat, show::ShowTarget};
use rcbuild::config::Config;
use rcbuild::orchestrator::{BuildFlags, BuildRequest};
use rcbuild::output::OutputMode;

#[derive(Parser)]
#[command(name = "rcbuild")]
#[command(about = "Container image builder for the R development images")]
#[command(
    after_help = "QUICK START:\n  rcbuild preflight                    Check build capabilities\n  rcbuild build r-container            Build the CI image\n  rcbuild build full-container --amd64 Cross-build the full image\n  rcbuild show targets                 List build stages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a target stage and everything it depends on
    Build {
        /// Stage to build (see `rcbuild show targets`)
        target: String,

        /// Build for amd64 regardless of the host architecture
        #[arg(long)]
        amd64: bool,

        /// Disable all build caching
        #[arg(long)]
        no_cache: bool,

        /// Import and export cache through this registry reference
        #[arg(long, value_name = "REF", conflicts_with = "no_cache")]
        cache_registry: Option<String>,

        /// Output form (default: load for native builds, oci otherwise)
        #[arg(long, value_enum)]
        output: Option<OutputArg>,

        /// Fail instead of falling back to rootless BuildKit
        #[arg(long)]
        no_fallback: bool,

        /// Verbose backend output
        #[arg(long)]
        debug: bool,

        /// Compile parallelism passed to the package installer (overrides BUILD_JOBS)
        #[arg(long, value_name = "N")]
        jobs: Option<String>,

        /// Cancel the build after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report which execution paths this host offers
    Preflight {
        /// Exit non-zero if any check fails
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowWhat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputArg {
    /// Load the image into the local daemon
    Load,
    /// Write an OCI layout directory
    Oci,
    /// Write a single-file image archive
    Tar,
}

impl From<OutputArg> for OutputMode {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Load => OutputMode::Load,
            OutputArg::Oci => OutputMode::OciDir,
            OutputArg::Tar => OutputMode::Tar,
        }
    }
}

#[derive(Subcommand)]
enum ShowWhat {
    /// Show current configuration
    Config,
    /// Show the build stage chain
    Targets,
}

fn init_tracing(debug: bool) {
    let default = if debug { "rcbuild=debug" } else { "rcbuild=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();

    let debug = matches!(cli.command, Commands::Build { debug: true, .. });
    init_tracing(debug);

    let config = Config::from_env();

    match cli.command {
        Commands::Build {
            target,
            amd64,
            no_cache,
            cache_registry,
            output,
            no_fallback,
            debug,
            jobs,
            timeout,
            json,
        } => {
            let cache = if no_cache {
                CacheMode::None
            } else {
                match cache_registry.or_else(|| config.cache_registry.clone()) {
                    Some(reference) => CacheMode::Registry(reference),
                    None => CacheMode::Default,
                }
            };
            let request = BuildRequest {
                target,
                force_amd64: amd64,
                cache,
                output: output.map(OutputMode::from),
                jobs,
                flags: BuildFlags { no_fallback, debug },
            };
            let format = if json {
                ReportFormat::Json
            } else {
                ReportFormat::Text
            };

            let code = commands::cmd_build(
                config,
                request,
                timeout.map(Duration::from_secs),
                format,
            )
            .await?;
            if code != 0 {
                std::process::exit(code);
            }
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict).await?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowWhat::Config => ShowTarget::Config,
                ShowWhat::Targets => ShowTarget::Targets,
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
