//! Error types for settle-rds

use settle_core::{RemoteError, SettleError};
use thiserror::Error;

use crate::upgrade::UpgradePhase;

/// Result type for settle-rds operations
pub type Result<T> = std::result::Result<T, UpgradeError>;

/// Errors returned by the upgrade orchestrator
///
/// Partial progress is never rolled back. Re-running the same plan after any
/// error that [`UpgradeError::is_retryable`] accepts is safe; members already
/// at the target version turn into no-ops.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpgradeError {
    /// A member-level mutation or wait failed
    #[error("member '{member}' of '{global_cluster}' in {region} failed during {stage} (last status: {}): {source}", display_status(.last_status))]
    Member {
        global_cluster: String,
        member: String,
        region: String,
        stage: UpgradePhase,
        last_status: Option<String>,
        #[source]
        source: SettleError,
    },

    /// The global cluster mutation or wait failed
    #[error("global cluster '{global_cluster}' failed during {stage} (last status: {}): {source}", display_status(.last_status))]
    Global {
        global_cluster: String,
        stage: UpgradePhase,
        last_status: Option<String>,
        #[source]
        source: SettleError,
    },

    /// The minor pass loop did not converge within its bound
    #[error("global cluster '{global_cluster}' did not converge on {target} after {passes} pass(es) (reported: {})\nHint: re-run the upgrade once the members are available", display_status(.reported))]
    ConvergenceExceeded {
        global_cluster: String,
        target: String,
        reported: Option<String>,
        passes: u32,
    },

    /// Every member settled but the aggregate never reported the target
    #[error("global cluster '{global_cluster}' reports version {reported} after upgrading to {target}")]
    VersionMismatch {
        global_cluster: String,
        target: String,
        reported: String,
    },

    /// The caller cancelled the upgrade
    #[error("upgrade of '{global_cluster}' cancelled during {stage}")]
    Cancelled {
        global_cluster: String,
        stage: UpgradePhase,
    },

    /// The member's home region could not be reached
    #[error("no gateway for region '{region}': {source}")]
    Routing {
        region: String,
        #[source]
        source: RemoteError,
    },

    /// The plan failed validation
    #[error("invalid upgrade plan: {0}")]
    InvalidPlan(String),

    /// The orchestrator configuration failed validation
    #[error("invalid upgrade configuration: {0}")]
    InvalidConfig(String),

    /// The orchestrator attempted a transition its state machine forbids
    #[error("invalid upgrade transition from {from} to {to}")]
    InvalidTransition { from: UpgradePhase, to: UpgradePhase },
}

fn display_status(status: &Option<String>) -> &str {
    status.as_deref().unwrap_or("unknown")
}

impl UpgradeError {
    /// The phase the orchestrator was in when the error happened
    pub fn stage(&self) -> Option<UpgradePhase> {
        match self {
            UpgradeError::Member { stage, .. }
            | UpgradeError::Global { stage, .. }
            | UpgradeError::Cancelled { stage, .. } => Some(*stage),
            UpgradeError::ConvergenceExceeded { .. } => Some(UpgradePhase::RetryMinor),
            UpgradeError::InvalidTransition { from, .. } => Some(*from),
            _ => None,
        }
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UpgradeError::Cancelled { .. })
    }

    /// The engine error behind a member or global failure
    pub fn settle_error(&self) -> Option<&SettleError> {
        match self {
            UpgradeError::Member { source, .. } | UpgradeError::Global { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// Whether re-invoking the same plan may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            UpgradeError::InvalidPlan(_)
            | UpgradeError::InvalidConfig(_)
            | UpgradeError::InvalidTransition { .. } => false,
            UpgradeError::Member { source, .. } | UpgradeError::Global { source, .. } => {
                !matches!(source, SettleError::InvalidConfig(_))
            }
            _ => true,
        }
    }
}
