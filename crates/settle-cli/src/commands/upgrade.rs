//! Upgrade command - run a global cluster upgrade against the simulated service

use std::sync::Arc;

use console::style;
use serde::Serialize;
use settle_core::SettleError;
use settle_engine::CancellationToken;
use settle_rds::{
    Call, DbCluster, GlobalClusterUpgrader, OperationCounts, RdsGateway, UpgradeOutcome,
    UpgradePlan,
};

use super::ErrorReport;
use crate::display;
use crate::error::{CliError, Result};
use crate::scenario::UpgradeScenario;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpgradeReport<'a> {
    kind: &'static str,
    name: Option<&'a str>,
    target_version: &'a str,
    outcome: Option<UpgradeOutcome>,
    global_version: Option<String>,
    members: Vec<DbCluster>,
    counts: OperationCounts,
    calls: Vec<Call>,
    error: Option<ErrorReport>,
}

pub async fn run(
    scenario: &UpgradeScenario,
    source: &str,
    cancel: &CancellationToken,
    json_output: bool,
) -> Result<()> {
    scenario.validate()?;

    let rds = scenario.simulation();
    let home = scenario
        .home_region()
        .ok_or_else(|| CliError::config("a global cluster needs at least one member"))?;
    let gateway: Arc<dyn RdsGateway> = Arc::new(rds.region(home));

    let global = gateway
        .describe_global_cluster(&scenario.global_cluster)
        .await
        .map_err(SettleError::from)?;
    let plan = UpgradePlan::from_global_cluster(&global, &scenario.target_version);
    rds.reset_counts();

    if !json_output {
        display::header("upgrade", scenario.name.as_deref(), source);
        println!(
            "  {} {} from {} to {} across {} member(s)",
            style("→").blue(),
            plan.global_cluster_id,
            global.engine_version,
            style(&plan.target_engine_version).cyan(),
            plan.members.len()
        );
    }

    let upgrader = GlobalClusterUpgrader::new(
        gateway,
        Arc::new(rds.clone()),
        scenario.upgrade_config(),
    );
    let result = upgrader
        .upgrade_engine_version(&plan, cancel)
        .await
        .map_err(CliError::from);

    let global_version = rds.global().map(|g| g.engine_version);
    let members: Vec<DbCluster> = plan
        .members
        .iter()
        .filter_map(|m| rds.cluster(&m.identifier))
        .collect();

    if json_output {
        let report = UpgradeReport {
            kind: "upgrade",
            name: scenario.name.as_deref(),
            target_version: &scenario.target_version,
            outcome: result.as_ref().ok().cloned(),
            global_version,
            members,
            counts: rds.operation_counts(),
            calls: rds.calls(),
            error: result.as_ref().err().map(ErrorReport::from),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return result.map(|_| ());
    }

    display::members(global_version.as_deref(), &members);
    display::calls(&rds.calls());

    let outcome = result?;
    display::outcome(&outcome);
    Ok(())
}
