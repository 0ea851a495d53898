//! Validate command - parse and check scenario files without running them

use std::path::{Path, PathBuf};

use console::style;
use serde::Serialize;

use super::ErrorReport;
use crate::error::{CliError, Result};
use crate::scenario::Scenario;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileReport {
    path: String,
    valid: bool,
    kind: Option<&'static str>,
    error: Option<ErrorReport>,
}

fn check(path: &Path) -> std::result::Result<&'static str, CliError> {
    let scenario = Scenario::load(path)?;
    scenario.validate()?;
    Ok(scenario.kind())
}

pub fn run(paths: &[PathBuf], json_output: bool) -> Result<()> {
    let mut reports = Vec::with_capacity(paths.len());

    for path in paths {
        let result = check(path);
        reports.push(FileReport {
            path: path.display().to_string(),
            valid: result.is_ok(),
            kind: result.as_ref().ok().copied(),
            error: result.as_ref().err().map(ErrorReport::from),
        });

        if json_output {
            continue;
        }
        match &result {
            Ok(kind) => println!(
                "{} {} ({} scenario)",
                style("✓").green(),
                path.display(),
                kind
            ),
            Err(err) => {
                println!("{} {}", style("✗").red(), path.display());
                println!("    {}", style(err).dim());
            }
        }
    }

    let invalid = reports.iter().filter(|r| !r.valid).count();

    if json_output {
        let output = serde_json::json!({
            "valid": invalid == 0,
            "files": reports,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if invalid == 0 {
        println!();
        println!("{} Validation passed!", style("✓").green().bold());
    }

    if invalid > 0 {
        return Err(CliError::config(format!(
            "{} of {} scenario file(s) failed validation",
            invalid,
            reports.len()
        )));
    }
    Ok(())
}
