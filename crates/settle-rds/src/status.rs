//! Cluster and global cluster statuses
//!
//! Labels the service may add later parse into `Unknown` instead of failing,
//! and the poll engine treats them as pending.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a database cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClusterStatus {
    Available,
    BackingUp,
    ConfiguringIamDatabaseAuth,
    Creating,
    Deleting,
    InaccessibleEncryptionCredentials,
    Migrating,
    Modifying,
    PreparingDataMigration,
    Rebooting,
    Renaming,
    ResettingMasterCredentials,
    ScalingCompute,
    Upgrading,
    Unknown(String),
}

impl ClusterStatus {
    /// Wire label for this status
    pub fn as_str(&self) -> &str {
        match self {
            ClusterStatus::Available => "available",
            ClusterStatus::BackingUp => "backing-up",
            ClusterStatus::ConfiguringIamDatabaseAuth => "configuring-iam-database-auth",
            ClusterStatus::Creating => "creating",
            ClusterStatus::Deleting => "deleting",
            ClusterStatus::InaccessibleEncryptionCredentials => {
                "inaccessible-encryption-credentials"
            }
            ClusterStatus::Migrating => "migrating",
            ClusterStatus::Modifying => "modifying",
            ClusterStatus::PreparingDataMigration => "preparing-data-migration",
            ClusterStatus::Rebooting => "rebooting",
            ClusterStatus::Renaming => "renaming",
            ClusterStatus::ResettingMasterCredentials => "resetting-master-credentials",
            ClusterStatus::ScalingCompute => "scaling-compute",
            ClusterStatus::Upgrading => "upgrading",
            ClusterStatus::Unknown(label) => label,
        }
    }
}

impl From<&str> for ClusterStatus {
    fn from(label: &str) -> Self {
        match label {
            "available" => ClusterStatus::Available,
            "backing-up" => ClusterStatus::BackingUp,
            "configuring-iam-database-auth" => ClusterStatus::ConfiguringIamDatabaseAuth,
            "creating" => ClusterStatus::Creating,
            "deleting" => ClusterStatus::Deleting,
            "inaccessible-encryption-credentials" => {
                ClusterStatus::InaccessibleEncryptionCredentials
            }
            "migrating" => ClusterStatus::Migrating,
            "modifying" => ClusterStatus::Modifying,
            "preparing-data-migration" => ClusterStatus::PreparingDataMigration,
            "rebooting" => ClusterStatus::Rebooting,
            "renaming" => ClusterStatus::Renaming,
            "resetting-master-credentials" => ClusterStatus::ResettingMasterCredentials,
            "scaling-compute" => ClusterStatus::ScalingCompute,
            "upgrading" => ClusterStatus::Upgrading,
            other => ClusterStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for ClusterStatus {
    fn from(label: String) -> Self {
        ClusterStatus::from(label.as_str())
    }
}

impl From<ClusterStatus> for String {
    fn from(status: ClusterStatus) -> Self {
        status.as_str().to_string()
    }
}

impl FromStr for ClusterStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ClusterStatus::from(s))
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a global cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GlobalClusterStatus {
    Available,
    Creating,
    Deleting,
    FailingOver,
    Modifying,
    SwitchingOver,
    Upgrading,
    Unknown(String),
}

impl GlobalClusterStatus {
    /// Wire label for this status
    pub fn as_str(&self) -> &str {
        match self {
            GlobalClusterStatus::Available => "available",
            GlobalClusterStatus::Creating => "creating",
            GlobalClusterStatus::Deleting => "deleting",
            GlobalClusterStatus::FailingOver => "failing-over",
            GlobalClusterStatus::Modifying => "modifying",
            GlobalClusterStatus::SwitchingOver => "switching-over",
            GlobalClusterStatus::Upgrading => "upgrading",
            GlobalClusterStatus::Unknown(label) => label,
        }
    }
}

impl From<&str> for GlobalClusterStatus {
    fn from(label: &str) -> Self {
        match label {
            "available" => GlobalClusterStatus::Available,
            "creating" => GlobalClusterStatus::Creating,
            "deleting" => GlobalClusterStatus::Deleting,
            "failing-over" => GlobalClusterStatus::FailingOver,
            "modifying" => GlobalClusterStatus::Modifying,
            "switching-over" => GlobalClusterStatus::SwitchingOver,
            "upgrading" => GlobalClusterStatus::Upgrading,
            other => GlobalClusterStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for GlobalClusterStatus {
    fn from(label: String) -> Self {
        GlobalClusterStatus::from(label.as_str())
    }
}

impl From<GlobalClusterStatus> for String {
    fn from(status: GlobalClusterStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for GlobalClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
