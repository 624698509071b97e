//! Build command - builds one target image.

use anyhow::Result;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::orchestrator::{BuildRequest, Orchestrator};
use crate::report::BuildResult;
use crate::runner::SystemRunner;

/// How the result is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Execute the build command. Returns the process exit code.
pub async fn cmd_build(
    config: Config,
    request: BuildRequest,
    timeout: Option<Duration>,
    format: ReportFormat,
) -> Result<i32> {
    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, timeout);

    let orchestrator = Orchestrator::new(SystemRunner, config);
    let result = orchestrator.build(&request, &cancel).await;
    cancel.cancel();

    report(&result, format)?;
    Ok(result.exit_code())
}

/// Cancel the build on Ctrl-C or when `timeout` elapses.
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    eprintln!("\n[CANCEL] Interrupted, stopping backend...");
                    on_signal.cancel();
                }
            }
            _ = on_signal.cancelled() => {}
        }
    });

    if let Some(timeout) = timeout {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    eprintln!("\n[CANCEL] Timed out after {}s, stopping backend...", timeout.as_secs());
                    on_timeout.cancel();
                }
                _ = on_timeout.cancelled() => {}
            }
        });
    }
}

fn report(result: &BuildResult, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => {
            println!();
            result.print();
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
    }
    Ok(())
}
