//! Show command - displays information.

use anyhow::Result;

use crate::config::Config;
use crate::target::CHAIN;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the stage chain
    Targets,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Targets => print_targets(),
    }
    Ok(())
}

fn print_targets() {
    println!("Build stages (each builds on the one above):\n");
    for stage in CHAIN {
        let marker = if stage.target.is_top_level() { "*" } else { " " };
        match stage.predecessor {
            Some(previous) => println!(
                "  {} {:<15} {} (on {})",
                marker,
                stage.target.name(),
                stage.description,
                previous
            ),
            None => println!("  {} {:<15} {}", marker, stage.target.name(), stage.description),
        }
    }
    println!("\n  * top-level image");
}
