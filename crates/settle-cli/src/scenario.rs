//! Scenario files
//!
//! A scenario is a YAML document describing either a scripted wait or a
//! simulated global cluster upgrade. Keys are camelCase and durations use the
//! human form (`250ms`, `2m`).

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use settle_core::{BackoffConfig, Label, Observation, PollTiming, RemoteError, RuleClassifier, WaitSpec};
use settle_rds::{SimulatedRds, UpgradeConfig};

use crate::error::{CliError, Result};

/// A parsed scenario file
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Scenario {
    Wait(WaitScenario),
    Upgrade(UpgradeScenario),
}

impl Scenario {
    /// Read and parse a scenario without validating it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Io {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            CliError::config_with_help(
                e.to_string(),
                "a scenario needs `kind: wait` or `kind: upgrade`",
            )
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scenario::Wait(_) => "wait",
            Scenario::Upgrade(_) => "upgrade",
        }
    }

    /// Cancellation deadline for the whole run
    pub fn deadline(&self) -> Option<Duration> {
        match self {
            Scenario::Wait(s) => s.deadline,
            Scenario::Upgrade(s) => s.deadline,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Scenario::Wait(s) => s.validate(),
            Scenario::Upgrade(s) => s.validate(),
        }
    }
}

/// Poll timing, defaulting to the service cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub min_interval: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let timing = PollTiming::default();
        Self {
            delay: timing.delay,
            interval: timing.interval,
            min_interval: timing.min_interval,
        }
    }
}

impl From<&TimingConfig> for PollTiming {
    fn from(config: &TimingConfig) -> Self {
        PollTiming {
            delay: config.delay,
            interval: config.interval,
            min_interval: config.min_interval,
        }
    }
}

/// One scripted refresh result
///
/// `~` is a not-found observation, a bare string is a status, and
/// `{ error: { code, message } }` is a failed refresh call.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Status(Label),
    Error { error: RemoteError },
    Absent,
}

impl Step {
    /// Observation for tick `tick`, the entity being the tick number
    pub fn observe(&self, tick: usize) -> std::result::Result<Observation<usize, Label>, RemoteError> {
        match self {
            Step::Status(status) => Ok(Observation::present(tick, status.clone())),
            Step::Error { error } => Err(error.clone()),
            Step::Absent => Ok(Observation::Absent),
        }
    }
}

fn default_not_found_tolerance() -> u32 {
    settle_core::spec::DEFAULT_NOT_FOUND_CHECKS
}

fn one() -> u32 {
    1
}

/// A scripted wait
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitScenario {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, with = "humantime_serde")]
    pub deadline: Option<Duration>,

    pub pending: Vec<Label>,

    #[serde(default)]
    pub target: Vec<Label>,

    #[serde(default)]
    pub failure: Vec<Label>,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default = "default_not_found_tolerance")]
    pub not_found_tolerance: u32,

    #[serde(default)]
    pub accept_not_found: bool,

    #[serde(default = "one")]
    pub consecutive_target_hits: u32,

    /// Classification of scripted refresh errors
    #[serde(default)]
    pub classifier: RuleClassifier,

    /// Refresh results in order; the last one repeats once the script ends
    pub observations: Vec<Step>,
}

impl WaitScenario {
    pub fn spec(&self) -> WaitSpec<Label> {
        let mut spec = WaitSpec::new(self.pending.iter().cloned(), self.target.iter().cloned())
            .failure(self.failure.iter().cloned())
            .timeout(self.timeout)
            .timing((&self.timing).into())
            .not_found_tolerance(self.not_found_tolerance)
            .consecutive_target_hits(self.consecutive_target_hits);
        if self.accept_not_found {
            spec = spec.accept_not_found();
        }
        spec
    }

    /// Step for the `index`th refresh call
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.observations
            .get(index)
            .or_else(|| self.observations.last())
    }

    pub fn validate(&self) -> Result<()> {
        self.spec().validate()?;
        if self.observations.is_empty() {
            return Err(CliError::config_with_help(
                "observations cannot be empty",
                "list at least one status, or `~` for not found",
            ));
        }
        Ok(())
    }
}

/// A member of the simulated global cluster
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberConfig {
    pub identifier: String,
    pub region: String,
    #[serde(default)]
    pub writer: bool,
    /// Starting version, when it differs from the global cluster's
    #[serde(default)]
    pub engine_version: Option<String>,
}

/// `member` is refused until `after` has been upgraded
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderingConfig {
    pub member: String,
    pub after: String,
}

/// A scripted mutation failure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultConfig {
    pub target: String,
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "one")]
    pub times: u32,
}

/// Orchestrator knobs; unset fields keep the library defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeKnobs {
    #[serde(default, with = "humantime_serde")]
    pub update_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub mutation_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub retry_delay: Option<Duration>,
    #[serde(default)]
    pub timing: Option<TimingConfig>,
    #[serde(default)]
    pub max_minor_passes: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub pass_interval: Option<Duration>,
}

/// A simulated global cluster upgrade
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeScenario {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, with = "humantime_serde")]
    pub deadline: Option<Duration>,

    pub global_cluster: String,
    pub engine_version: String,
    pub target_version: String,
    pub members: Vec<MemberConfig>,

    /// Describe calls an entity stays `upgrading` after a mutation
    #[serde(default)]
    pub settle_after: u32,

    #[serde(default)]
    pub aggregate_lag: u32,

    #[serde(default)]
    pub ordering: Vec<OrderingConfig>,

    #[serde(default)]
    pub faults: Vec<FaultConfig>,

    #[serde(default)]
    pub config: UpgradeKnobs,
}

impl UpgradeScenario {
    /// Build the simulated service described by the scenario
    pub fn simulation(&self) -> SimulatedRds {
        let mut rds = SimulatedRds::new()
            .with_global_cluster(&self.global_cluster, &self.engine_version)
            .settle_after(self.settle_after)
            .lag_aggregate(self.aggregate_lag);

        for member in &self.members {
            rds = rds.with_member(&member.identifier, &member.region, member.writer);
            if let Some(version) = &member.engine_version {
                rds = rds.with_member_version(&member.identifier, version);
            }
        }
        for rule in &self.ordering {
            rds = rds.require_before(&rule.member, &rule.after);
        }
        for fault in &self.faults {
            rds = rds.inject_fault(
                &fault.target,
                RemoteError::new(&fault.code, &fault.message),
                fault.times,
            );
        }
        rds
    }

    pub fn upgrade_config(&self) -> UpgradeConfig {
        let defaults = UpgradeConfig::default();
        let knobs = &self.config;
        UpgradeConfig {
            update_timeout: knobs.update_timeout.unwrap_or(defaults.update_timeout),
            mutation_timeout: knobs.mutation_timeout.unwrap_or(defaults.mutation_timeout),
            timing: knobs
                .timing
                .as_ref()
                .map(PollTiming::from)
                .unwrap_or(defaults.timing),
            backoff: knobs
                .retry_delay
                .map(BackoffConfig::fixed)
                .unwrap_or(defaults.backoff),
            max_minor_passes: knobs.max_minor_passes.unwrap_or(defaults.max_minor_passes),
            pass_interval: knobs.pass_interval.unwrap_or(defaults.pass_interval),
        }
    }

    /// Region of the writer member, where global calls are issued
    pub fn home_region(&self) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.writer)
            .or_else(|| self.members.first())
            .map(|m| m.region.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.global_cluster.trim().is_empty() {
            return Err(CliError::config("globalCluster cannot be empty"));
        }
        if self.engine_version.trim().is_empty() || self.target_version.trim().is_empty() {
            return Err(CliError::config(
                "engineVersion and targetVersion cannot be empty",
            ));
        }
        if self.members.is_empty() {
            return Err(CliError::config("a global cluster needs at least one member"));
        }

        let mut known = HashSet::new();
        for member in &self.members {
            if member.region.trim().is_empty() {
                return Err(CliError::config(format!(
                    "member '{}' has no region",
                    member.identifier
                )));
            }
            if !known.insert(member.identifier.as_str()) {
                return Err(CliError::config(format!(
                    "member '{}' is listed more than once",
                    member.identifier
                )));
            }
        }

        let writers = self.members.iter().filter(|m| m.writer).count();
        if writers > 1 {
            return Err(CliError::config_with_help(
                format!("{writers} members are marked as writer"),
                "a global cluster has exactly one primary",
            ));
        }

        for rule in &self.ordering {
            for id in [&rule.member, &rule.after] {
                if !known.contains(id.as_str()) {
                    return Err(CliError::config(format!(
                        "ordering refers to unknown member '{id}'"
                    )));
                }
            }
        }

        for fault in &self.faults {
            if fault.target != self.global_cluster && !known.contains(fault.target.as_str()) {
                return Err(CliError::config(format!(
                    "fault targets unknown cluster '{}'",
                    fault.target
                )));
            }
        }

        self.upgrade_config().validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: &str = r#"
kind: wait
name: slow create
pending: [creating]
target: [available]
failure: [failed]
timeout: 50ms
timing:
  delay: 0s
  interval: 10ms
  minInterval: 0s
observations: [creating, ~, available]
"#;

    const UPGRADE: &str = r#"
kind: upgrade
globalCluster: orders
engineVersion: "13.4"
targetVersion: "13.7"
members:
  - identifier: orders-replica
    region: us-west-2
  - identifier: orders-primary
    region: us-east-1
    writer: true
ordering:
  - member: orders-primary
    after: orders-replica
faults:
  - target: orders-replica
    code: Throttling
    message: Rate exceeded
    times: 2
config:
  retryDelay: 10ms
  maxMinorPasses: 4
"#;

    #[test]
    fn test_parse_wait_scenario() {
        let scenario = Scenario::parse(WAIT).unwrap();
        assert_eq!(scenario.kind(), "wait");
        scenario.validate().unwrap();

        let Scenario::Wait(wait) = scenario else {
            panic!("expected a wait scenario");
        };
        assert_eq!(wait.name.as_deref(), Some("slow create"));
        assert_eq!(wait.timeout, Duration::from_millis(50));
        assert!(matches!(wait.step(1), Some(Step::Absent)));
        // The last observation repeats.
        assert!(matches!(wait.step(10), Some(Step::Status(s)) if s.as_str() == "available"));
        assert_eq!(wait.spec().expected(), "available");
    }

    #[test]
    fn test_parse_error_step() {
        let yaml = r#"
kind: wait
pending: [creating]
target: [available]
timeout: 1s
observations:
  - error: { code: AccessDenied, message: nope }
"#;
        let Scenario::Wait(wait) = Scenario::parse(yaml).unwrap() else {
            panic!("expected a wait scenario");
        };
        let err = wait.step(0).unwrap().observe(0).unwrap_err();
        assert_eq!(err.code, "AccessDenied");
    }

    #[test]
    fn test_invalid_wait_scenarios() {
        let overlapping = WAIT.replace("failure: [failed]", "failure: [available]");
        let err = Scenario::parse(&overlapping).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("target and failure"));

        let empty = WAIT.replace("[creating, ~, available]", "[]");
        assert!(Scenario::parse(&empty).unwrap().validate().is_err());

        let bad_label = WAIT.replace("[creating]", "[Creating!]");
        assert!(Scenario::parse(&bad_label).is_err());

        assert!(Scenario::parse("kind: reboot").is_err());
    }

    #[test]
    fn test_parse_upgrade_scenario() {
        let scenario = Scenario::parse(UPGRADE).unwrap();
        scenario.validate().unwrap();

        let Scenario::Upgrade(upgrade) = scenario else {
            panic!("expected an upgrade scenario");
        };
        assert_eq!(upgrade.home_region(), Some("us-east-1"));

        let config = upgrade.upgrade_config();
        assert_eq!(config.max_minor_passes, 4);
        assert_eq!(config.backoff.initial_delay, Duration::from_millis(10));
        assert_eq!(config.update_timeout, UpgradeConfig::default().update_timeout);

        let rds = upgrade.simulation();
        let global = rds.global().unwrap();
        assert_eq!(global.engine_version, "13.4");
        assert_eq!(global.members.len(), 2);
    }

    #[test]
    fn test_invalid_upgrade_scenarios() {
        let unknown = UPGRADE.replace("after: orders-replica", "after: orders-ghost");
        let err = Scenario::parse(&unknown).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("orders-ghost"));

        let two_writers = UPGRADE.replace(
            "    region: us-west-2\n",
            "    region: us-west-2\n    writer: true\n",
        );
        assert!(Scenario::parse(&two_writers).unwrap().validate().is_err());

        let zero_passes = UPGRADE.replace("maxMinorPasses: 4", "maxMinorPasses: 0");
        let err = Scenario::parse(&zero_passes).unwrap().validate().unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::CONFIG_ERROR);
    }
}
