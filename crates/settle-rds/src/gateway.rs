//! Remote gateway and region router traits
//!
//! The waiters and the upgrade orchestrator depend on the managed service only
//! through these traits. Transport, authentication and pagination live in
//! the implementations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use settle_core::RemoteError;

use crate::status::{ClusterStatus, GlobalClusterStatus};

/// A regional database cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCluster {
    pub identifier: String,
    pub region: String,
    pub engine_version: String,
    pub status: ClusterStatus,
    #[serde(default)]
    pub global_cluster_identifier: Option<String>,
}

/// A member of a global cluster as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalClusterMember {
    pub cluster_identifier: String,
    pub region: String,
    pub is_writer: bool,
}

/// A global cluster spanning several regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCluster {
    pub identifier: String,
    pub engine_version: String,
    pub status: GlobalClusterStatus,
    pub members: Vec<GlobalClusterMember>,
}

/// Request to modify a regional cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyClusterInput {
    pub cluster_identifier: String,
    pub engine_version: String,
    pub apply_immediately: bool,
    pub allow_major_version_upgrade: bool,
}

/// Request to modify a global cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyGlobalClusterInput {
    pub global_cluster_identifier: String,
    pub engine_version: String,
    pub allow_major_version_upgrade: bool,
}

/// Describe/modify calls against one region of the service
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait RdsGateway: Send + Sync {
    /// Region this gateway issues calls against
    fn region(&self) -> &str;

    /// Describe a regional cluster
    async fn describe_cluster(&self, identifier: &str) -> Result<DbCluster, RemoteError>;

    /// Modify a regional cluster
    async fn modify_cluster(&self, input: &ModifyClusterInput) -> Result<(), RemoteError>;

    /// Describe a global cluster
    async fn describe_global_cluster(&self, identifier: &str)
    -> Result<GlobalCluster, RemoteError>;

    /// Modify a global cluster
    async fn modify_global_cluster(&self, input: &ModifyGlobalClusterInput)
    -> Result<(), RemoteError>;
}

/// Returns a gateway scoped to a member's home region
pub trait RegionRouter: Send + Sync {
    fn route(&self, region: &str) -> Result<Arc<dyn RdsGateway>, RemoteError>;
}
