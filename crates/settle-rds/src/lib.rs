//! Settle RDS - waiters and global cluster upgrades for a managed database service
//!
//! This crate provides:
//! - **Gateway traits**: the narrow describe/modify surface the waiters need,
//!   plus a region router for multi-region resources
//! - **Typed statuses**: cluster and global cluster status enums
//! - **Waiters**: the standard created/updated/deleted waits built on the poll engine
//! - **Upgrade orchestrator**: major-then-minor engine version upgrades across
//!   every member of a global cluster, with convergence checking
//! - **Simulated gateway**: an in-memory service model for tests and dry runs

pub mod classify;
pub mod error;
pub mod gateway;
pub mod simulated;
pub mod status;
pub mod upgrade;
pub mod waiters;

pub use error::{Result, UpgradeError};
pub use gateway::{
    DbCluster, GlobalCluster, GlobalClusterMember, ModifyClusterInput, ModifyGlobalClusterInput,
    RdsGateway, RegionRouter,
};
pub use simulated::{Call, Operation, OperationCounts, SimulatedRds, SimulatedRegion};
pub use status::{ClusterStatus, GlobalClusterStatus};
pub use upgrade::{
    GlobalClusterUpgrader, MemberRef, UpgradeConfig, UpgradeEvent, UpgradeOutcome, UpgradePhase,
    UpgradePlan, UpgradeStateMachine, UpgradeStrategy,
};
