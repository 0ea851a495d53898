//! Standard waiters for clusters and global clusters
//!
//! Each waiter is a status-set declaration on top of the poll engine; the
//! gateway is always passed in explicitly so the caller decides which region
//! is observed.

use std::time::Duration;

use settle_core::{Observation, PollTiming, Result, SettleError, WaitSpec};
use settle_engine::wait_for_status;
use tokio_util::sync::CancellationToken;

use crate::classify::describe_classifier;
use crate::gateway::{DbCluster, GlobalCluster, RdsGateway};
use crate::status::{ClusterStatus, GlobalClusterStatus};

/// Wait spec for a cluster being created
pub fn cluster_created_spec(timeout: Duration, timing: PollTiming) -> WaitSpec<ClusterStatus> {
    WaitSpec::new(
        [
            ClusterStatus::BackingUp,
            ClusterStatus::Creating,
            ClusterStatus::Migrating,
            ClusterStatus::Modifying,
            ClusterStatus::PreparingDataMigration,
            ClusterStatus::Rebooting,
            ClusterStatus::ResettingMasterCredentials,
        ],
        [ClusterStatus::Available],
    )
    .timeout(timeout)
    .timing(timing)
}

/// Wait spec for a cluster being modified or upgraded
pub fn cluster_updated_spec(timeout: Duration, timing: PollTiming) -> WaitSpec<ClusterStatus> {
    WaitSpec::new(
        [
            ClusterStatus::BackingUp,
            ClusterStatus::ConfiguringIamDatabaseAuth,
            ClusterStatus::Modifying,
            ClusterStatus::Renaming,
            ClusterStatus::ResettingMasterCredentials,
            ClusterStatus::ScalingCompute,
            ClusterStatus::Upgrading,
        ],
        [ClusterStatus::Available],
    )
    .failure([ClusterStatus::InaccessibleEncryptionCredentials])
    .timeout(timeout)
    .timing(timing)
}

/// Wait spec for a cluster being deleted
pub fn cluster_deleted_spec(timeout: Duration, timing: PollTiming) -> WaitSpec<ClusterStatus> {
    WaitSpec::new(
        [
            ClusterStatus::Available,
            ClusterStatus::BackingUp,
            ClusterStatus::Deleting,
            ClusterStatus::Modifying,
        ],
        [],
    )
    .accept_not_found()
    .not_found_tolerance(0)
    .timeout(timeout)
    .timing(timing)
}

/// Wait spec for a global cluster being modified or upgraded
pub fn global_cluster_updated_spec(
    timeout: Duration,
    timing: PollTiming,
) -> WaitSpec<GlobalClusterStatus> {
    WaitSpec::new(
        [GlobalClusterStatus::Modifying, GlobalClusterStatus::Upgrading],
        [GlobalClusterStatus::Available],
    )
    .timeout(timeout)
    .timing(timing)
}

/// Wait spec for a global cluster being deleted
pub fn global_cluster_deleted_spec(
    timeout: Duration,
    timing: PollTiming,
) -> WaitSpec<GlobalClusterStatus> {
    WaitSpec::new(
        [GlobalClusterStatus::Available, GlobalClusterStatus::Deleting],
        [],
    )
    .accept_not_found()
    .not_found_tolerance(0)
    .timeout(timeout)
    .timing(timing)
}

async fn wait_cluster(
    gateway: &dyn RdsGateway,
    identifier: &str,
    spec: &WaitSpec<ClusterStatus>,
    cancel: &CancellationToken,
) -> Result<Option<DbCluster>> {
    tracing::debug!(cluster = identifier, region = gateway.region(), expected = %spec.expected(), "waiting for cluster");

    wait_for_status(
        || async move {
            gateway.describe_cluster(identifier).await.map(|cluster| {
                let status = cluster.status.clone();
                Observation::present(cluster, status)
            })
        },
        spec,
        &describe_classifier(),
        cancel,
    )
    .await
}

async fn wait_global_cluster(
    gateway: &dyn RdsGateway,
    identifier: &str,
    spec: &WaitSpec<GlobalClusterStatus>,
    cancel: &CancellationToken,
) -> Result<Option<GlobalCluster>> {
    tracing::debug!(global_cluster = identifier, expected = %spec.expected(), "waiting for global cluster");

    wait_for_status(
        || async move {
            gateway
                .describe_global_cluster(identifier)
                .await
                .map(|global| {
                    let status = global.status.clone();
                    Observation::present(global, status)
                })
        },
        spec,
        &describe_classifier(),
        cancel,
    )
    .await
}

/// A target-status wait only returns `None` if absence was accepted
fn present<T>(entity: Option<T>) -> Result<T> {
    entity.ok_or(SettleError::NotFound { checks: 0 })
}

/// Wait for a new cluster to become available
pub async fn wait_cluster_created(
    gateway: &dyn RdsGateway,
    identifier: &str,
    timeout: Duration,
    timing: PollTiming,
    cancel: &CancellationToken,
) -> Result<DbCluster> {
    let spec = cluster_created_spec(timeout, timing);
    present(wait_cluster(gateway, identifier, &spec, cancel).await?)
}

/// Wait for a modified cluster to become available again
pub async fn wait_cluster_updated(
    gateway: &dyn RdsGateway,
    identifier: &str,
    timeout: Duration,
    timing: PollTiming,
    cancel: &CancellationToken,
) -> Result<DbCluster> {
    let spec = cluster_updated_spec(timeout, timing);
    present(wait_cluster(gateway, identifier, &spec, cancel).await?)
}

/// Wait for a cluster to disappear
pub async fn wait_cluster_deleted(
    gateway: &dyn RdsGateway,
    identifier: &str,
    timeout: Duration,
    timing: PollTiming,
    cancel: &CancellationToken,
) -> Result<()> {
    let spec = cluster_deleted_spec(timeout, timing);
    wait_cluster(gateway, identifier, &spec, cancel).await?;
    Ok(())
}

/// Wait for a modified global cluster to become available again
pub async fn wait_global_cluster_updated(
    gateway: &dyn RdsGateway,
    identifier: &str,
    timeout: Duration,
    timing: PollTiming,
    cancel: &CancellationToken,
) -> Result<GlobalCluster> {
    let spec = global_cluster_updated_spec(timeout, timing);
    present(wait_global_cluster(gateway, identifier, &spec, cancel).await?)
}

/// Wait for a global cluster to report `engine_version` as its own version
///
/// The aggregate version can trail the members for a few reads after an
/// upgrade. Any other version counts as pending, so a timeout carries the
/// last version seen as its last status.
pub async fn wait_global_cluster_version(
    gateway: &dyn RdsGateway,
    identifier: &str,
    engine_version: &str,
    timeout: Duration,
    timing: PollTiming,
    cancel: &CancellationToken,
) -> Result<GlobalCluster> {
    tracing::debug!(global_cluster = identifier, version = engine_version, "waiting for global cluster version");

    let spec = WaitSpec::new([], [engine_version.to_string()])
        .timeout(timeout)
        .timing(timing);
    let global = wait_for_status(
        || async move {
            gateway
                .describe_global_cluster(identifier)
                .await
                .map(|global| {
                    let version = global.engine_version.clone();
                    Observation::present(global, version)
                })
        },
        &spec,
        &describe_classifier(),
        cancel,
    )
    .await?;
    present(global)
}

/// Wait for a global cluster to disappear
pub async fn wait_global_cluster_deleted(
    gateway: &dyn RdsGateway,
    identifier: &str,
    timeout: Duration,
    timing: PollTiming,
    cancel: &CancellationToken,
) -> Result<()> {
    let spec = global_cluster_deleted_spec(timeout, timing);
    wait_global_cluster(gateway, identifier, &spec, cancel).await?;
    Ok(())
}
