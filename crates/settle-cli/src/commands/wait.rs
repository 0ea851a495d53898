//! Wait command - run a scripted poll against the wait engine

use console::style;
use serde::Serialize;
use settle_engine::{CancellationToken, wait_for_status};

use super::ErrorReport;
use crate::display;
use crate::error::{CliError, Result};
use crate::scenario::{Step, WaitScenario};

/// JSON report of a scripted wait
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WaitReport<'a> {
    kind: &'static str,
    name: Option<&'a str>,
    expected: String,
    /// `target` or `absent` on success
    result: Option<&'static str>,
    refreshes: usize,
    observed: Vec<String>,
    error: Option<ErrorReport>,
}

fn describe(step: &Step) -> String {
    match step {
        Step::Status(status) => status.to_string(),
        Step::Error { error } => format!("error {error}"),
        Step::Absent => "<absent>".to_string(),
    }
}

pub async fn run(
    scenario: &WaitScenario,
    source: &str,
    cancel: &CancellationToken,
    json_output: bool,
) -> Result<()> {
    scenario.validate()?;
    let spec = scenario.spec();

    if !json_output {
        display::header("wait", scenario.name.as_deref(), source);
        println!(
            "  {} waiting for {} (timeout {:?})",
            style("→").blue(),
            spec.expected(),
            spec.timeout
        );
    }

    let mut observed = Vec::new();
    let refresh = || {
        let tick = observed.len();
        let step = scenario.step(tick).cloned().unwrap_or(Step::Absent);
        let seen = describe(&step);
        if !json_output {
            display::refresh(tick + 1, &seen);
        }
        observed.push(seen);
        async move { step.observe(tick + 1) }
    };

    let result = wait_for_status(refresh, &spec, &scenario.classifier, cancel)
        .await
        .map_err(CliError::from);

    let outcome = result.as_ref().ok().map(|settled| match settled {
        Some(_) => "target",
        None => "absent",
    });

    if json_output {
        let report = WaitReport {
            kind: "wait",
            name: scenario.name.as_deref(),
            expected: spec.expected(),
            result: outcome,
            refreshes: observed.len(),
            observed,
            error: result.as_ref().err().map(ErrorReport::from),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return result.map(|_| ());
    }

    match result? {
        Some(tick) => {
            display::success(&format!("Reached {} on refresh {}", spec.expected(), tick))
        }
        None => display::success("Resource is gone"),
    }
    Ok(())
}
