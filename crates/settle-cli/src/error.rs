//! Errors surfaced by the `settle` binary
//!
//! Library errors are folded into [`CliError`], whose variant decides the
//! process exit code.

use miette::Diagnostic;
use settle_core::SettleError;
use settle_rds::UpgradeError;
use thiserror::Error;

use crate::exit_codes;

/// A failed command, carrying enough to pick an exit code
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Scenario failed to parse or validate
    #[error("Invalid scenario: {message}")]
    #[diagnostic(code(settle::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Budget exhausted while still pending
    #[error("{message}")]
    #[diagnostic(code(settle::cli::timeout))]
    Timeout { message: String },

    /// Entity reached a failure status
    #[error("{message}")]
    #[diagnostic(code(settle::cli::failure_state))]
    FailureState { message: String },

    /// Scenario file could not be read
    #[error("IO error: {message}")]
    #[diagnostic(code(settle::cli::io))]
    Io { message: String },

    /// Interrupted or deadline reached
    #[error("{message}")]
    #[diagnostic(code(settle::cli::cancelled))]
    Cancelled { message: String },

    /// Upgrade gave up after its last minor pass
    #[error("{message}")]
    #[diagnostic(code(settle::cli::convergence))]
    ConvergenceExceeded {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Upgrade failed on a member or the global cluster
    #[error("Upgrade failed: {message}")]
    #[diagnostic(code(settle::cli::upgrade))]
    Upgrade {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Remote call failed
    #[error("{message}")]
    #[diagnostic(code(settle::cli::remote))]
    Remote { message: String },

    /// Runtime or serialization failure
    #[error("Internal error: {message}")]
    #[diagnostic(code(settle::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Timeout { .. } => exit_codes::TIMEOUT,
            CliError::FailureState { .. } => exit_codes::FAILURE_STATE,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Cancelled { .. } => exit_codes::CANCELLED,
            CliError::ConvergenceExceeded { .. } => exit_codes::CONVERGENCE_EXCEEDED,
            CliError::Upgrade { .. } => exit_codes::ERROR,
            CliError::Remote { .. } => exit_codes::ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Short machine-readable kind, used in JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Config { .. } => "config",
            CliError::Timeout { .. } => "timeout",
            CliError::FailureState { .. } => "failureState",
            CliError::Io { .. } => "io",
            CliError::Cancelled { .. } => "cancelled",
            CliError::ConvergenceExceeded { .. } => "convergenceExceeded",
            CliError::Upgrade { .. } => "upgrade",
            CliError::Remote { .. } => "remote",
            CliError::Internal { .. } => "internal",
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::config(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(err.to_string())
    }
}

impl From<SettleError> for CliError {
    fn from(err: SettleError) -> Self {
        let message = err.to_string();
        match err {
            SettleError::Timeout { .. } => CliError::Timeout { message },
            SettleError::FailureState { .. } => CliError::FailureState { message },
            SettleError::Cancelled => CliError::Cancelled { message },
            SettleError::InvalidConfig(_) => CliError::config(message),
            _ => CliError::Remote { message },
        }
    }
}

impl From<UpgradeError> for CliError {
    fn from(err: UpgradeError) -> Self {
        let message = err.to_string();
        match &err {
            UpgradeError::Cancelled { .. } => CliError::Cancelled { message },
            UpgradeError::ConvergenceExceeded { .. } => CliError::ConvergenceExceeded {
                message,
                help: Some("raise maxMinorPasses or check the members' ordering".to_string()),
            },
            UpgradeError::InvalidPlan(_) | UpgradeError::InvalidConfig(_) => {
                CliError::config(message)
            }
            _ => CliError::Upgrade {
                message,
                help: err
                    .is_retryable()
                    .then(|| "members already upgraded are kept; re-running is safe".to_string()),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_settle_error_exit_codes() {
        let timeout: CliError = SettleError::Timeout {
            timeout: Duration::from_secs(1),
            last_status: Some("creating".to_string()),
            expected: "available".to_string(),
        }
        .into();
        assert_eq!(timeout.exit_code(), exit_codes::TIMEOUT);

        let failure: CliError = SettleError::FailureState {
            status: "failed".to_string(),
            expected: "available".to_string(),
        }
        .into();
        assert_eq!(failure.exit_code(), exit_codes::FAILURE_STATE);

        let cancelled: CliError = SettleError::Cancelled.into();
        assert_eq!(cancelled.exit_code(), exit_codes::CANCELLED);
        assert_eq!(cancelled.kind(), "cancelled");
    }

    #[test]
    fn test_upgrade_error_exit_codes() {
        let exceeded: CliError = UpgradeError::ConvergenceExceeded {
            global_cluster: "orders".to_string(),
            target: "13.7".to_string(),
            reported: None,
            passes: 3,
        }
        .into();
        assert_eq!(exceeded.exit_code(), exit_codes::CONVERGENCE_EXCEEDED);

        let plan: CliError = UpgradeError::InvalidPlan("no members".to_string()).into();
        assert_eq!(plan.exit_code(), exit_codes::CONFIG_ERROR);
    }
}
