//! Simulated multi-region service
//!
//! This gateway keeps one global cluster and its members in memory, useful
//! for tests and dry runs without a cloud account. Each member is only
//! visible from its home region, so routing a call to the wrong region shows
//! up as `DBClusterNotFoundFault` exactly as it would against the service.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use settle_core::RemoteError;

use crate::classify::{
    ERR_CLUSTER_NOT_FOUND, ERR_GLOBAL_CLUSTER_NOT_FOUND, ERR_INVALID_CLUSTER_STATE,
    ERR_INVALID_GLOBAL_CLUSTER_STATE, ERR_INVALID_PARAMETER_VALUE,
};
use crate::gateway::{
    DbCluster, GlobalCluster, GlobalClusterMember, ModifyClusterInput, ModifyGlobalClusterInput,
    RdsGateway, RegionRouter,
};
use crate::status::{ClusterStatus, GlobalClusterStatus};

/// Kind of call made against the simulated service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    DescribeCluster,
    ModifyCluster,
    DescribeGlobalCluster,
    ModifyGlobalCluster,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub region: String,
    pub operation: Operation,
    pub target: String,
    pub succeeded: bool,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub describes: usize,
    pub modifies: usize,
    pub global_describes: usize,
    pub global_modifies: usize,
}

#[derive(Debug, Clone)]
struct SimCluster {
    identifier: String,
    region: String,
    engine_version: String,
    status: ClusterStatus,
    is_writer: bool,
    global_cluster_identifier: Option<String>,
    /// Describe calls left before a transitional status settles
    pending: u32,
}

impl SimCluster {
    fn to_cluster(&self) -> DbCluster {
        DbCluster {
            identifier: self.identifier.clone(),
            region: self.region.clone(),
            engine_version: self.engine_version.clone(),
            status: self.status.clone(),
            global_cluster_identifier: self.global_cluster_identifier.clone(),
        }
    }

    fn tick(&mut self) {
        if self.pending > 0 {
            self.pending -= 1;
        } else if matches!(
            self.status,
            ClusterStatus::Upgrading | ClusterStatus::Modifying
        ) {
            self.status = ClusterStatus::Available;
        }
    }
}

#[derive(Debug, Clone)]
struct SimGlobal {
    identifier: String,
    engine_version: String,
    status: GlobalClusterStatus,
    pending: u32,
    /// Target of the last accepted major upgrade, while still current
    upgraded_to: Option<String>,
}

#[derive(Debug, Clone)]
struct Fault {
    target: String,
    error: RemoteError,
    remaining: u32,
}

#[derive(Debug, Default)]
struct World {
    global: Option<SimGlobal>,
    /// Members in the order they were added
    clusters: Vec<SimCluster>,
    settle_after: u32,
    aggregate_lag: u32,
    lag_remaining: u32,
    /// (member, prerequisite) pairs
    ordering: Vec<(String, String)>,
    faults: Vec<Fault>,
    calls: Vec<Call>,
    counts: OperationCounts,
}

impl World {
    fn record(&mut self, region: &str, operation: Operation, target: &str, succeeded: bool) {
        match operation {
            Operation::DescribeCluster => self.counts.describes += 1,
            Operation::ModifyCluster => self.counts.modifies += 1,
            Operation::DescribeGlobalCluster => self.counts.global_describes += 1,
            Operation::ModifyGlobalCluster => self.counts.global_modifies += 1,
        }
        self.calls.push(Call {
            region: region.to_string(),
            operation,
            target: target.to_string(),
            succeeded,
        });
    }

    fn take_fault(&mut self, target: &str) -> Option<RemoteError> {
        let fault = self
            .faults
            .iter_mut()
            .find(|f| f.target == target && f.remaining > 0)?;
        fault.remaining -= 1;
        Some(fault.error.clone())
    }

    fn cluster_in(&mut self, region: &str, identifier: &str) -> Option<&mut SimCluster> {
        self.clusters
            .iter_mut()
            .find(|c| c.identifier == identifier && c.region == region)
    }

    fn to_global(&self) -> Option<GlobalCluster> {
        let global = self.global.as_ref()?;
        Some(GlobalCluster {
            identifier: global.identifier.clone(),
            engine_version: global.engine_version.clone(),
            status: global.status.clone(),
            members: self
                .clusters
                .iter()
                .filter(|c| c.global_cluster_identifier.as_deref() == Some(&global.identifier))
                .map(|c| GlobalClusterMember {
                    cluster_identifier: c.identifier.clone(),
                    region: c.region.clone(),
                    is_writer: c.is_writer,
                })
                .collect(),
        })
    }

    /// Let the aggregate version follow the members once they all agree
    fn follow_members(&mut self) {
        let Some(global) = self.global.as_mut() else {
            return;
        };
        let mut versions = self
            .clusters
            .iter()
            .filter(|c| c.global_cluster_identifier.as_deref() == Some(&global.identifier))
            .map(|c| c.engine_version.as_str());
        let Some(first) = versions.next() else {
            return;
        };
        if first == global.engine_version || !versions.all(|v| v == first) {
            return;
        }

        if self.lag_remaining > 0 {
            self.lag_remaining -= 1;
        } else {
            if global.upgraded_to.as_deref() != Some(first) {
                global.upgraded_to = None;
            }
            global.engine_version = first.to_string();
            self.lag_remaining = self.aggregate_lag;
        }
    }

    fn describe_cluster(
        &mut self,
        region: &str,
        identifier: &str,
    ) -> Result<DbCluster, RemoteError> {
        let result = match self.cluster_in(region, identifier) {
            Some(cluster) => {
                cluster.tick();
                Ok(cluster.to_cluster())
            }
            None => Err(cluster_not_found(identifier)),
        };
        self.record(region, Operation::DescribeCluster, identifier, result.is_ok());
        result
    }

    fn modify_cluster(&mut self, region: &str, input: &ModifyClusterInput) -> Result<(), RemoteError> {
        let result = self.apply_modify_cluster(region, input);
        self.record(
            region,
            Operation::ModifyCluster,
            &input.cluster_identifier,
            result.is_ok(),
        );
        result
    }

    fn apply_modify_cluster(
        &mut self,
        region: &str,
        input: &ModifyClusterInput,
    ) -> Result<(), RemoteError> {
        let id = input.cluster_identifier.as_str();
        if let Some(fault) = self.take_fault(id) {
            return Err(fault);
        }

        let (current_version, status) = match self.cluster_in(region, id) {
            Some(cluster) => (cluster.engine_version.clone(), cluster.status.clone()),
            None => return Err(cluster_not_found(id)),
        };

        if status != ClusterStatus::Available {
            return Err(RemoteError::new(
                ERR_INVALID_CLUSTER_STATE,
                format!("DB cluster {id} is not available for modification (status: {status})"),
            ));
        }

        if current_version == input.engine_version {
            return Ok(());
        }

        let blocked = self
            .ordering
            .iter()
            .filter(|(member, _)| member == id)
            .any(|(_, prerequisite)| {
                !self.clusters.iter().any(|c| {
                    c.identifier == *prerequisite
                        && c.engine_version == input.engine_version
                        && c.status == ClusterStatus::Available
                })
            });
        if blocked {
            return Err(RemoteError::new(
                ERR_INVALID_PARAMETER_VALUE,
                format!("Unable to upgrade DB cluster {id}: upgrade global replicas first"),
            ));
        }

        if is_major_change(&current_version, &input.engine_version)
            && !input.allow_major_version_upgrade
        {
            return Err(RemoteError::new(
                ERR_INVALID_PARAMETER_VALUE,
                "The AllowMajorVersionUpgrade flag must be present when upgrading to a new major version.",
            ));
        }

        let settle_after = self.settle_after;
        if let Some(cluster) = self.cluster_in(region, id) {
            cluster.engine_version = input.engine_version.clone();
            cluster.status = ClusterStatus::Upgrading;
            cluster.pending = settle_after;
        }
        Ok(())
    }

    fn describe_global_cluster(
        &mut self,
        region: &str,
        identifier: &str,
    ) -> Result<GlobalCluster, RemoteError> {
        let found = match self.global.as_mut() {
            Some(global) if global.identifier == identifier => {
                if global.pending > 0 {
                    global.pending -= 1;
                } else if global.status == GlobalClusterStatus::Upgrading {
                    global.status = GlobalClusterStatus::Available;
                }
                true
            }
            _ => false,
        };

        let result = if found {
            self.follow_members();
            self.to_global()
                .ok_or_else(|| global_cluster_not_found(identifier))
        } else {
            Err(global_cluster_not_found(identifier))
        };
        self.record(
            region,
            Operation::DescribeGlobalCluster,
            identifier,
            result.is_ok(),
        );
        result
    }

    fn modify_global_cluster(
        &mut self,
        region: &str,
        input: &ModifyGlobalClusterInput,
    ) -> Result<(), RemoteError> {
        let result = self.apply_modify_global_cluster(input);
        self.record(
            region,
            Operation::ModifyGlobalCluster,
            &input.global_cluster_identifier,
            result.is_ok(),
        );
        result
    }

    fn apply_modify_global_cluster(
        &mut self,
        input: &ModifyGlobalClusterInput,
    ) -> Result<(), RemoteError> {
        let id = input.global_cluster_identifier.as_str();
        if let Some(fault) = self.take_fault(id) {
            return Err(fault);
        }

        let settle_after = self.settle_after;
        let Some(global) = self.global.as_mut().filter(|g| g.identifier == id) else {
            return Err(global_cluster_not_found(id));
        };

        if global.status != GlobalClusterStatus::Available {
            return Err(RemoteError::new(
                ERR_INVALID_GLOBAL_CLUSTER_STATE,
                format!("Global cluster {id} is {}", global.status),
            ));
        }

        // Repeating the last major upgrade is accepted and changes nothing.
        if global.upgraded_to.as_deref() == Some(input.engine_version.as_str()) {
            return Ok(());
        }

        if !is_major_change(&global.engine_version, &input.engine_version) {
            return Err(RemoteError::new(
                ERR_INVALID_PARAMETER_VALUE,
                "ModifyGlobalCluster only supports Major Version Upgrades. To patch the members \
                 of your global cluster to a newer minor version you need to call \
                 ModifyDbCluster in each one of them.",
            ));
        }

        if !input.allow_major_version_upgrade {
            return Err(RemoteError::new(
                ERR_INVALID_PARAMETER_VALUE,
                "The AllowMajorVersionUpgrade flag must be present when upgrading to a new major version.",
            ));
        }

        // The aggregate version follows once the members report it.
        global.upgraded_to = Some(input.engine_version.clone());
        global.status = GlobalClusterStatus::Upgrading;
        global.pending = settle_after;

        for cluster in self
            .clusters
            .iter_mut()
            .filter(|c| c.global_cluster_identifier.as_deref() == Some(id))
        {
            cluster.engine_version = input.engine_version.clone();
            cluster.status = ClusterStatus::Upgrading;
            cluster.pending = settle_after;
        }
        Ok(())
    }
}

fn is_major_change(from: &str, to: &str) -> bool {
    let major = |v: &str| v.split('.').next().unwrap_or(v).to_string();
    major(from) != major(to)
}

fn cluster_not_found(identifier: &str) -> RemoteError {
    RemoteError::new(
        ERR_CLUSTER_NOT_FOUND,
        format!("DBCluster {identifier} not found."),
    )
}

fn global_cluster_not_found(identifier: &str) -> RemoteError {
    RemoteError::new(
        ERR_GLOBAL_CLUSTER_NOT_FOUND,
        format!("Global cluster {identifier} not found."),
    )
}

fn lock(world: &RwLock<World>) -> RwLockWriteGuard<'_, World> {
    world.write().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory model of the service, shared by all of its regions
#[derive(Clone, Default)]
pub struct SimulatedRds {
    world: Arc<RwLock<World>>,
}

impl SimulatedRds {
    /// Create an empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the global cluster
    pub fn with_global_cluster(self, identifier: &str, engine_version: &str) -> Self {
        lock(&self.world).global = Some(SimGlobal {
            identifier: identifier.to_string(),
            engine_version: engine_version.to_string(),
            status: GlobalClusterStatus::Available,
            pending: 0,
            upgraded_to: None,
        });
        self
    }

    /// Add a member cluster at the global cluster's version
    pub fn with_member(self, identifier: &str, region: &str, is_writer: bool) -> Self {
        {
            let mut world = lock(&self.world);
            let (global_id, version) = match &world.global {
                Some(g) => (Some(g.identifier.clone()), g.engine_version.clone()),
                None => (None, String::new()),
            };
            world.clusters.push(SimCluster {
                identifier: identifier.to_string(),
                region: region.to_string(),
                engine_version: version,
                status: ClusterStatus::Available,
                is_writer,
                global_cluster_identifier: global_id,
                pending: 0,
            });
        }
        self
    }

    /// Override a member's engine version
    pub fn with_member_version(self, identifier: &str, engine_version: &str) -> Self {
        if let Some(cluster) = lock(&self.world)
            .clusters
            .iter_mut()
            .find(|c| c.identifier == identifier)
        {
            cluster.engine_version = engine_version.to_string();
        }
        self
    }

    /// Describe calls an entity stays `upgrading` after a mutation
    pub fn settle_after(self, describes: u32) -> Self {
        lock(&self.world).settle_after = describes;
        self
    }

    /// Refuse `member`'s upgrade until `prerequisite` is available at the requested version
    pub fn require_before(self, member: &str, prerequisite: &str) -> Self {
        lock(&self.world)
            .ordering
            .push((member.to_string(), prerequisite.to_string()));
        self
    }

    /// Fail the next `times` mutations of `target` with `error`
    pub fn inject_fault(self, target: &str, error: RemoteError, times: u32) -> Self {
        lock(&self.world).faults.push(Fault {
            target: target.to_string(),
            error,
            remaining: times,
        });
        self
    }

    /// Global describes that still report the old version once members agree
    pub fn lag_aggregate(self, describes: u32) -> Self {
        {
            let mut world = lock(&self.world);
            world.aggregate_lag = describes;
            world.lag_remaining = describes;
        }
        self
    }

    /// A gateway issuing calls against `region`
    pub fn region(&self, name: &str) -> SimulatedRegion {
        SimulatedRegion {
            name: name.to_string(),
            world: Arc::clone(&self.world),
        }
    }

    /// Current state of a cluster, in any region
    pub fn cluster(&self, identifier: &str) -> Option<DbCluster> {
        lock(&self.world)
            .clusters
            .iter()
            .find(|c| c.identifier == identifier)
            .map(SimCluster::to_cluster)
    }

    /// Current state of the global cluster
    pub fn global(&self) -> Option<GlobalCluster> {
        lock(&self.world).to_global()
    }

    /// Delete a cluster
    pub fn remove_cluster(&self, identifier: &str) {
        lock(&self.world)
            .clusters
            .retain(|c| c.identifier != identifier);
    }

    /// Force the global cluster into `status` for the next `settle_after` describes
    pub fn set_global_status(&self, status: GlobalClusterStatus) {
        let mut world = lock(&self.world);
        let settle_after = world.settle_after;
        if let Some(global) = world.global.as_mut() {
            global.status = status;
            global.pending = settle_after;
        }
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.world).calls.clone()
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        lock(&self.world).counts.clone()
    }

    /// Reset operation counts and the call log
    pub fn reset_counts(&self) {
        let mut world = lock(&self.world);
        world.counts = OperationCounts::default();
        world.calls.clear();
    }
}

impl RegionRouter for SimulatedRds {
    fn route(&self, region: &str) -> Result<Arc<dyn RdsGateway>, RemoteError> {
        Ok(Arc::new(self.region(region)))
    }
}

/// Region-scoped view of a [`SimulatedRds`]
#[derive(Clone)]
pub struct SimulatedRegion {
    name: String,
    world: Arc<RwLock<World>>,
}

#[async_trait]
impl RdsGateway for SimulatedRegion {
    fn region(&self) -> &str {
        &self.name
    }

    async fn describe_cluster(&self, identifier: &str) -> Result<DbCluster, RemoteError> {
        lock(&self.world).describe_cluster(&self.name, identifier)
    }

    async fn modify_cluster(&self, input: &ModifyClusterInput) -> Result<(), RemoteError> {
        lock(&self.world).modify_cluster(&self.name, input)
    }

    async fn describe_global_cluster(
        &self,
        identifier: &str,
    ) -> Result<GlobalCluster, RemoteError> {
        lock(&self.world).describe_global_cluster(&self.name, identifier)
    }

    async fn modify_global_cluster(
        &self,
        input: &ModifyGlobalClusterInput,
    ) -> Result<(), RemoteError> {
        lock(&self.world).modify_global_cluster(&self.name, input)
    }
}
