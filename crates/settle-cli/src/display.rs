//! Display formatting for CLI output
//!
//! Human-readable rendering of wait traces, upgrade outcomes, member
//! versions and the simulated call log. JSON output bypasses this module.

use console::style;
use settle_rds::{Call, DbCluster, UpgradeOutcome};

/// Print the banner for a scenario run
pub fn header(kind: &str, name: Option<&str>, source: &str) {
    match name {
        Some(name) => println!(
            "{} Running {} scenario {} ({})",
            style("→").blue(),
            kind,
            style(name).cyan().bold(),
            style(source).dim()
        ),
        None => println!(
            "{} Running {} scenario {}",
            style("→").blue(),
            kind,
            style(source).cyan()
        ),
    }
}

/// One refresh of a scripted wait
pub fn refresh(tick: usize, observed: &str) {
    println!(
        "  {} refresh {}: {}",
        style("→").blue(),
        tick,
        style(observed).yellow()
    );
}

pub fn success(message: &str) {
    println!();
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn outcome(outcome: &UpgradeOutcome) {
    println!();
    println!(
        "{} Converged on {} via {} upgrade",
        style("✓").green().bold(),
        style(&outcome.converged_version).cyan().bold(),
        outcome.strategy
    );
}

/// Member versions after the run
pub fn members(global_version: Option<&str>, members: &[DbCluster]) {
    println!();
    match global_version {
        Some(version) => println!("{} (global {})", style("Members").bold(), version),
        None => println!("{}", style("Members").bold()),
    }

    let width = members
        .iter()
        .map(|m| m.identifier.len())
        .max()
        .unwrap_or(0);

    for member in members {
        let icon = if Some(member.engine_version.as_str()) == global_version {
            style("✓").green()
        } else {
            style("•").yellow()
        };
        println!(
            "  {} {:<width$}  {:<10} {}  {}",
            icon,
            member.identifier,
            member.region,
            member.engine_version,
            style(&member.status).dim(),
            width = width
        );
    }
}

pub fn calls(calls: &[Call]) {
    println!();
    println!("{} ({})", style("Calls").bold(), calls.len());

    for (i, call) in calls.iter().enumerate() {
        let icon = if call.succeeded {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "  {:>3} {} {:<22} {} {}",
            i + 1,
            icon,
            format!("{:?}", call.operation),
            call.target,
            style(&call.region).dim()
        );
    }
}
