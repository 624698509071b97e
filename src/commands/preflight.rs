//! Preflight command - runs preflight checks.

use anyhow::Result;

use crate::config::Config;
use crate::platform;
use crate::preflight;
use crate::runner::SystemRunner;

/// Execute the preflight command.
pub async fn cmd_preflight(config: &Config, strict: bool) -> Result<()> {
    let host = platform::host_machine();
    if strict {
        preflight::run_preflight_or_fail(&SystemRunner, config, host).await?;
    } else {
        let report = preflight::run_preflight(&SystemRunner, config, host).await;
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to exit non-zero.");
        }
    }
    Ok(())
}
