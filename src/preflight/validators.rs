//! Content validation for build inputs.
//!
//! A Dockerfile that exists but lacks a stage fails deep into the build,
//! after the base layers were already pulled. Check the stage names up front.

use std::path::Path;

use crate::target::CHAIN;

/// Stage names declared with `FROM <image> AS <name>`.
pub fn dockerfile_stages(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            if !words.next()?.eq_ignore_ascii_case("FROM") {
                return None;
            }
            let mut words = words.skip_while(|w| !w.eq_ignore_ascii_case("AS"));
            words.next()?;
            words.next().map(str::to_string)
        })
        .collect()
}

/// Validate the Dockerfile declares every stage of the chain.
///
/// Returns the number of declared stages.
pub fn validate_dockerfile(path: &Path) -> Result<usize, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("Cannot read: {}", e))?;
    let stages = dockerfile_stages(&content);

    let missing: Vec<_> = CHAIN
        .iter()
        .map(|s| s.target.name())
        .filter(|name| !stages.iter().any(|s| s == name))
        .collect();

    if !missing.is_empty() {
        return Err(format!("Missing stage(s): {}", missing.join(", ")));
    }
    Ok(stages.len())
}
