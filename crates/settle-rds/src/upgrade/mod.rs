//! Engine version upgrades across every member of a global cluster
//!
//! The service cannot be asked in advance whether a version change is major
//! or minor, so the major path is always attempted first. A refusal carrying
//! the "only supports Major Version Upgrades" fault is a typed branch into the
//! minor path, where each member is upgraded in its own region, one at a
//! time, until the global cluster's own re-read reports the target version.

mod phase;
mod plan;

pub use phase::{UpgradeEvent, UpgradePhase, UpgradeStateMachine};
pub use plan::{MemberRef, UpgradeOutcome, UpgradePlan, UpgradeStrategy};

use std::sync::Arc;
use std::time::Duration;

use settle_core::{BackoffConfig, PollTiming, RemoteError, RetrySpec, SettleError};
use settle_engine::{retry, sleep_or_cancel};
use tokio_util::sync::CancellationToken;

use crate::classify::{
    global_modify_classifier, is_major_only_signal, is_ordering_signal, member_modify_classifier,
};
use crate::error::{Result, UpgradeError};
use crate::gateway::{ModifyClusterInput, ModifyGlobalClusterInput, RdsGateway, RegionRouter};
use crate::waiters::{
    wait_cluster_updated, wait_global_cluster_updated, wait_global_cluster_version,
};

/// Timeouts and bounds for one upgrade
#[derive(Debug, Clone)]
pub struct UpgradeConfig {
    /// Budget for each wait on a member or the global cluster
    pub update_timeout: Duration,
    /// Budget for retrying each mutation
    pub mutation_timeout: Duration,
    pub timing: PollTiming,
    pub backoff: BackoffConfig,
    /// Upper bound on minor passes before giving up
    pub max_minor_passes: u32,
    /// Sleep between two minor passes
    pub pass_interval: Duration,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            update_timeout: Duration::from_secs(120 * 60),
            mutation_timeout: Duration::from_secs(5 * 60),
            timing: PollTiming::default(),
            backoff: BackoffConfig::default(),
            max_minor_passes: 10,
            pass_interval: Duration::from_secs(30),
        }
    }
}

impl UpgradeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.update_timeout.is_zero() {
            return Err(UpgradeError::InvalidConfig(
                "update timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_minor_passes == 0 {
            return Err(UpgradeError::InvalidConfig(
                "max minor passes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of the major attempt
#[derive(Debug)]
enum MajorAttempt {
    Succeeded,
    FallBackToMinor { reason: RemoteError },
    Failed(SettleError),
}

/// Drives a global cluster to a target engine version
///
/// The global gateway serves global cluster calls. Every member call goes
/// through the gateway the router returns for the member's home region.
pub struct GlobalClusterUpgrader {
    global: Arc<dyn RdsGateway>,
    router: Arc<dyn RegionRouter>,
    config: UpgradeConfig,
}

impl GlobalClusterUpgrader {
    pub fn new(
        global: Arc<dyn RdsGateway>,
        router: Arc<dyn RegionRouter>,
        config: UpgradeConfig,
    ) -> Self {
        Self {
            global,
            router,
            config,
        }
    }

    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// Upgrade every member of `plan` to its target engine version
    ///
    /// On error, members already upgraded stay upgraded. Running the same
    /// plan again is safe.
    pub async fn upgrade_engine_version(
        &self,
        plan: &UpgradePlan,
        cancel: &CancellationToken,
    ) -> Result<UpgradeOutcome> {
        plan.validate()?;
        self.config.validate()?;

        let mut fsm = UpgradeStateMachine::new();
        match self.run(plan, &mut fsm, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if !fsm.phase().is_terminal() {
                    fsm.fire(UpgradeEvent::ErrorOccurred)?;
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        plan: &UpgradePlan,
        fsm: &mut UpgradeStateMachine,
        cancel: &CancellationToken,
    ) -> Result<UpgradeOutcome> {
        fsm.fire(UpgradeEvent::PlanAccepted)?;

        match self.attempt_major(plan, cancel).await {
            MajorAttempt::Succeeded => {
                fsm.fire(UpgradeEvent::MajorAccepted)?;
                self.settle_major(plan, cancel).await?;
                fsm.fire(UpgradeEvent::AggregateConfirmed)?;
                Ok(UpgradeOutcome {
                    strategy: UpgradeStrategy::Major,
                    converged_version: plan.target_engine_version.clone(),
                })
            }
            MajorAttempt::FallBackToMinor { reason } => {
                tracing::info!(
                    global_cluster = %plan.global_cluster_id,
                    target = %plan.target_engine_version,
                    %reason,
                    "not a major version change, upgrading members individually"
                );
                fsm.fire(UpgradeEvent::MajorRefusedAsMinor)?;
                self.converge_minor(plan, fsm, cancel).await
            }
            MajorAttempt::Failed(source) => Err(self
                .global_error(plan, UpgradePhase::AttemptingMajor, source)
                .await),
        }
    }

    async fn attempt_major(&self, plan: &UpgradePlan, cancel: &CancellationToken) -> MajorAttempt {
        let input = ModifyGlobalClusterInput {
            global_cluster_identifier: plan.global_cluster_id.clone(),
            engine_version: plan.target_engine_version.clone(),
            allow_major_version_upgrade: true,
        };
        let spec = RetrySpec::new(self.config.mutation_timeout, global_modify_classifier())
            .backoff(self.config.backoff.clone());

        match retry(|| self.global.modify_global_cluster(&input), &spec, cancel).await {
            Ok(()) => MajorAttempt::Succeeded,
            Err(SettleError::Remote(reason)) if is_major_only_signal(&reason) => {
                MajorAttempt::FallBackToMinor { reason }
            }
            Err(err) => MajorAttempt::Failed(err),
        }
    }

    /// Wait for the global cluster, each member in its own region, then the
    /// aggregate version
    async fn settle_major(&self, plan: &UpgradePlan, cancel: &CancellationToken) -> Result<()> {
        let stage = UpgradePhase::MajorSucceeded;

        if let Err(source) = wait_global_cluster_updated(
            self.global.as_ref(),
            &plan.global_cluster_id,
            self.config.update_timeout,
            self.config.timing,
            cancel,
        )
        .await
        {
            return Err(self.global_error(plan, stage, source).await);
        }

        for member in &plan.members {
            if cancel.is_cancelled() {
                return Err(cancelled(plan, stage));
            }

            let gateway = self.route(member)?;
            if let Err(source) = wait_cluster_updated(
                gateway.as_ref(),
                &member.identifier,
                self.config.update_timeout,
                self.config.timing,
                cancel,
            )
            .await
            {
                return Err(self
                    .member_error(plan, member, gateway.as_ref(), stage, source)
                    .await);
            }
            tracing::debug!(member = %member.identifier, region = %member.home_region, "member settled");
        }

        match wait_global_cluster_version(
            self.global.as_ref(),
            &plan.global_cluster_id,
            &plan.target_engine_version,
            self.config.update_timeout,
            self.config.timing,
            cancel,
        )
        .await
        {
            Ok(_) => Ok(()),
            Err(SettleError::Timeout {
                last_status: Some(reported),
                ..
            }) => Err(UpgradeError::VersionMismatch {
                global_cluster: plan.global_cluster_id.clone(),
                target: plan.target_engine_version.clone(),
                reported,
            }),
            Err(source) => Err(self.global_error(plan, stage, source).await),
        }
    }

    async fn converge_minor(
        &self,
        plan: &UpgradePlan,
        fsm: &mut UpgradeStateMachine,
        cancel: &CancellationToken,
    ) -> Result<UpgradeOutcome> {
        let mut passes: u32 = 0;

        loop {
            fsm.fire(UpgradeEvent::MinorPassStarted)?;
            passes += 1;
            tracing::info!(global_cluster = %plan.global_cluster_id, pass = passes, "starting minor pass");

            let needs_another_pass = self.minor_pass(plan, cancel).await?;

            if !needs_another_pass {
                let reported = self
                    .aggregate_version(plan, UpgradePhase::AttemptingMinor)
                    .await?;
                if reported == plan.target_engine_version {
                    fsm.fire(UpgradeEvent::AggregateConfirmed)?;
                    tracing::info!(
                        global_cluster = %plan.global_cluster_id,
                        version = %reported,
                        passes,
                        "global cluster converged"
                    );
                    return Ok(UpgradeOutcome {
                        strategy: UpgradeStrategy::Minor,
                        converged_version: reported,
                    });
                }
                tracing::info!(
                    global_cluster = %plan.global_cluster_id,
                    %reported,
                    target = %plan.target_engine_version,
                    "global cluster not converged yet"
                );
            }

            fsm.fire(UpgradeEvent::PassIncomplete)?;

            if passes >= self.config.max_minor_passes {
                let reported = self
                    .global
                    .describe_global_cluster(&plan.global_cluster_id)
                    .await
                    .ok()
                    .map(|global| global.engine_version);
                return Err(UpgradeError::ConvergenceExceeded {
                    global_cluster: plan.global_cluster_id.clone(),
                    target: plan.target_engine_version.clone(),
                    reported,
                    passes,
                });
            }

            if sleep_or_cancel(self.config.pass_interval, cancel)
                .await
                .is_err()
            {
                return Err(cancelled(plan, UpgradePhase::RetryMinor));
            }
        }
    }

    /// Upgrade each member in plan order
    ///
    /// Returns whether an ordering signal asked for another pass. A member
    /// whose mutation was accepted is waited on before the next one starts.
    async fn minor_pass(&self, plan: &UpgradePlan, cancel: &CancellationToken) -> Result<bool> {
        let stage = UpgradePhase::AttemptingMinor;
        let spec = RetrySpec::new(self.config.mutation_timeout, member_modify_classifier())
            .backoff(self.config.backoff.clone());
        let mut needs_another_pass = false;

        for member in &plan.members {
            if cancel.is_cancelled() {
                return Err(cancelled(plan, stage));
            }

            let gateway = self.route(member)?;
            let input = ModifyClusterInput {
                cluster_identifier: member.identifier.clone(),
                engine_version: plan.target_engine_version.clone(),
                apply_immediately: true,
                allow_major_version_upgrade: false,
            };

            match retry(|| gateway.modify_cluster(&input), &spec, cancel).await {
                Ok(()) => {}
                Err(SettleError::Remote(reason)) if is_ordering_signal(&reason) => {
                    tracing::info!(
                        member = %member.identifier,
                        region = %member.home_region,
                        %reason,
                        "member blocked by upgrade ordering, another pass needed"
                    );
                    needs_another_pass = true;
                    continue;
                }
                Err(source) => {
                    return Err(self
                        .member_error(plan, member, gateway.as_ref(), stage, source)
                        .await);
                }
            }

            if let Err(source) = wait_cluster_updated(
                gateway.as_ref(),
                &member.identifier,
                self.config.update_timeout,
                self.config.timing,
                cancel,
            )
            .await
            {
                return Err(self
                    .member_error(plan, member, gateway.as_ref(), stage, source)
                    .await);
            }
            tracing::debug!(member = %member.identifier, region = %member.home_region, "member upgraded");
        }

        Ok(needs_another_pass)
    }

    fn route(&self, member: &MemberRef) -> Result<Arc<dyn RdsGateway>> {
        self.router
            .route(&member.home_region)
            .map_err(|source| UpgradeError::Routing {
                region: member.home_region.clone(),
                source,
            })
    }

    async fn aggregate_version(&self, plan: &UpgradePlan, stage: UpgradePhase) -> Result<String> {
        match self
            .global
            .describe_global_cluster(&plan.global_cluster_id)
            .await
        {
            Ok(global) => Ok(global.engine_version),
            Err(err) => Err(UpgradeError::Global {
                global_cluster: plan.global_cluster_id.clone(),
                stage,
                last_status: None,
                source: err.into(),
            }),
        }
    }

    async fn member_error(
        &self,
        plan: &UpgradePlan,
        member: &MemberRef,
        gateway: &dyn RdsGateway,
        stage: UpgradePhase,
        source: SettleError,
    ) -> UpgradeError {
        if source.is_cancelled() {
            return cancelled(plan, stage);
        }

        let last_status = match source.last_status() {
            Some(status) => Some(status.to_string()),
            None => gateway
                .describe_cluster(&member.identifier)
                .await
                .ok()
                .map(|cluster| cluster.status.to_string()),
        };

        UpgradeError::Member {
            global_cluster: plan.global_cluster_id.clone(),
            member: member.identifier.clone(),
            region: member.home_region.clone(),
            stage,
            last_status,
            source,
        }
    }

    async fn global_error(
        &self,
        plan: &UpgradePlan,
        stage: UpgradePhase,
        source: SettleError,
    ) -> UpgradeError {
        if source.is_cancelled() {
            return cancelled(plan, stage);
        }

        let last_status = match source.last_status() {
            Some(status) => Some(status.to_string()),
            None => self
                .global
                .describe_global_cluster(&plan.global_cluster_id)
                .await
                .ok()
                .map(|global| global.status.to_string()),
        };

        UpgradeError::Global {
            global_cluster: plan.global_cluster_id.clone(),
            stage,
            last_status,
            source,
        }
    }
}

fn cancelled(plan: &UpgradePlan, stage: UpgradePhase) -> UpgradeError {
    UpgradeError::Cancelled {
        global_cluster: plan.global_cluster_id.clone(),
        stage,
    }
}
