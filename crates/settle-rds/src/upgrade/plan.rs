//! Upgrade plans and outcomes

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpgradeError};
use crate::gateway::GlobalCluster;

/// A member cluster and the region that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    pub identifier: String,
    pub home_region: String,
}

impl MemberRef {
    pub fn new(identifier: impl Into<String>, home_region: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            home_region: home_region.into(),
        }
    }
}

/// What to upgrade and to which version
///
/// Built once per invocation and never modified while the upgrade runs.
/// Members are processed in the listed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePlan {
    pub global_cluster_id: String,
    pub target_engine_version: String,
    pub members: Vec<MemberRef>,
}

impl UpgradePlan {
    pub fn new(
        global_cluster_id: impl Into<String>,
        target_engine_version: impl Into<String>,
        members: Vec<MemberRef>,
    ) -> Self {
        Self {
            global_cluster_id: global_cluster_id.into(),
            target_engine_version: target_engine_version.into(),
            members,
        }
    }

    /// Build a plan from a described global cluster, writer first
    pub fn from_global_cluster(
        global: &GlobalCluster,
        target_engine_version: impl Into<String>,
    ) -> Self {
        let (writers, readers): (Vec<_>, Vec<_>) =
            global.members.iter().partition(|m| m.is_writer);

        let members = writers
            .into_iter()
            .chain(readers)
            .map(|m| MemberRef::new(&m.cluster_identifier, &m.region))
            .collect();

        Self::new(&global.identifier, target_engine_version, members)
    }

    pub fn validate(&self) -> Result<()> {
        if self.global_cluster_id.trim().is_empty() {
            return Err(UpgradeError::InvalidPlan(
                "global cluster identifier cannot be empty".to_string(),
            ));
        }

        if self.target_engine_version.trim().is_empty() {
            return Err(UpgradeError::InvalidPlan(
                "target engine version cannot be empty".to_string(),
            ));
        }

        if self.members.is_empty() {
            return Err(UpgradeError::InvalidPlan(format!(
                "global cluster '{}' has no members",
                self.global_cluster_id
            )));
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            if member.identifier.trim().is_empty() {
                return Err(UpgradeError::InvalidPlan(
                    "member identifier cannot be empty".to_string(),
                ));
            }
            if member.home_region.trim().is_empty() {
                return Err(UpgradeError::InvalidPlan(format!(
                    "member '{}' has no home region",
                    member.identifier
                )));
            }
            if !seen.insert(member.identifier.as_str()) {
                return Err(UpgradeError::InvalidPlan(format!(
                    "member '{}' is listed more than once",
                    member.identifier
                )));
            }
        }

        Ok(())
    }
}

/// Which path brought the members to the target version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeStrategy {
    Major,
    Minor,
}

impl std::fmt::Display for UpgradeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpgradeStrategy::Major => write!(f, "major"),
            UpgradeStrategy::Minor => write!(f, "minor"),
        }
    }
}

/// The only value an upgrade returns on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeOutcome {
    pub strategy: UpgradeStrategy,
    pub converged_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GlobalClusterMember;
    use crate::status::GlobalClusterStatus;

    fn plan(members: Vec<MemberRef>) -> UpgradePlan {
        UpgradePlan::new("orders", "13.7", members)
    }

    #[test]
    fn test_from_global_cluster_puts_writer_first() {
        let global = GlobalCluster {
            identifier: "orders".to_string(),
            engine_version: "13.4".to_string(),
            status: GlobalClusterStatus::Available,
            members: vec![
                GlobalClusterMember {
                    cluster_identifier: "orders-eu".to_string(),
                    region: "eu-west-1".to_string(),
                    is_writer: false,
                },
                GlobalClusterMember {
                    cluster_identifier: "orders-us".to_string(),
                    region: "us-east-1".to_string(),
                    is_writer: true,
                },
                GlobalClusterMember {
                    cluster_identifier: "orders-ap".to_string(),
                    region: "ap-south-1".to_string(),
                    is_writer: false,
                },
            ],
        };

        let plan = UpgradePlan::from_global_cluster(&global, "13.7");
        let order: Vec<_> = plan.members.iter().map(|m| m.identifier.as_str()).collect();
        assert_eq!(order, ["orders-us", "orders-eu", "orders-ap"]);
        assert_eq!(plan.members[0].home_region, "us-east-1");
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_plans() {
        assert!(plan(vec![]).validate().is_err());

        let dup = plan(vec![
            MemberRef::new("a", "us-east-1"),
            MemberRef::new("a", "us-west-2"),
        ]);
        assert!(dup.validate().unwrap_err().to_string().contains("more than once"));

        let no_region = plan(vec![MemberRef::new("a", "")]);
        assert!(no_region.validate().is_err());

        let no_version = UpgradePlan::new("orders", " ", vec![MemberRef::new("a", "us-east-1")]);
        assert!(no_version.validate().is_err());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = UpgradeOutcome {
            strategy: UpgradeStrategy::Minor,
            converged_version: "13.7".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["strategy"], "minor");
        assert_eq!(json["convergedVersion"], "13.7");
    }
}
