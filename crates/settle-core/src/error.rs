//! Error types for settle-core

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for settle operations
pub type Result<T> = std::result::Result<T, SettleError>;

/// Structured error reported by a remote gateway
///
/// The remote API reports failures as a fault code plus a free-form message.
/// Classification rules match on both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Fault code (e.g. `InvalidDBClusterStateFault`)
    pub code: String,

    /// Human-readable message returned with the fault
    #[serde(default)]
    pub message: String,
}

impl RemoteError {
    /// Create a new remote error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Check whether the fault code equals `code`
    pub fn code_equals(&self, code: &str) -> bool {
        self.code == code
    }

    /// Check whether the fault code equals `code` and the message contains `needle`
    pub fn message_contains(&self, code: &str, needle: &str) -> bool {
        self.code_equals(code) && self.message.contains(needle)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for RemoteError {}

/// Errors produced by the poll and retry engines
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum SettleError {
    /// The remote gateway returned an error that was not retried
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The entity reached one of the declared failure statuses
    #[error("unexpected state '{status}', wanted target '{expected}'")]
    FailureState { status: String, expected: String },

    /// The budget was exhausted while the entity was still pending
    #[error("timeout while waiting for state to become '{expected}' (last state: '{}', timeout: {timeout:?})", display_status(.last_status))]
    Timeout {
        timeout: Duration,
        last_status: Option<String>,
        expected: String,
    },

    /// The entity kept being reported as absent
    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid wait or retry configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn display_status(status: &Option<String>) -> &str {
    status.as_deref().unwrap_or("<none>")
}

impl SettleError {
    /// Check if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, SettleError::Timeout { .. })
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SettleError::Cancelled)
    }

    /// Check if the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, SettleError::NotFound { .. })
    }

    /// The last status observed before the error, when known
    pub fn last_status(&self) -> Option<&str> {
        match self {
            SettleError::FailureState { status, .. } => Some(status),
            SettleError::Timeout { last_status, .. } => last_status.as_deref(),
            _ => None,
        }
    }

    /// The remote error carried by this error, if any
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            SettleError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_matching() {
        let err = RemoteError::new(
            "InvalidParameterValue",
            "ModifyGlobalCluster only supports Major Version Upgrades.",
        );

        assert!(err.code_equals("InvalidParameterValue"));
        assert!(err.message_contains("InvalidParameterValue", "only supports Major"));
        assert!(!err.message_contains("InvalidDBClusterStateFault", "only supports Major"));
        assert!(!err.message_contains("InvalidParameterValue", "minor"));
    }

    #[test]
    fn test_remote_error_display() {
        assert_eq!(
            RemoteError::new("Throttling", "Rate exceeded").to_string(),
            "Throttling: Rate exceeded"
        );
        assert_eq!(RemoteError::new("Throttling", "").to_string(), "Throttling");
    }

    #[test]
    fn test_timeout_display_carries_last_status() {
        let err = SettleError::Timeout {
            timeout: Duration::from_secs(5),
            last_status: Some("creating".to_string()),
            expected: "available".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("'creating'"));
        assert!(msg.contains("'available'"));
        assert!(err.is_timeout());
        assert_eq!(err.last_status(), Some("creating"));
    }

    #[test]
    fn test_timeout_display_without_status() {
        let err = SettleError::Timeout {
            timeout: Duration::from_secs(1),
            last_status: None,
            expected: "available".to_string(),
        };
        assert!(err.to_string().contains("<none>"));
        assert_eq!(err.last_status(), None);
    }

    #[test]
    fn test_remote_conversion() {
        let err: SettleError = RemoteError::new("DBClusterNotFoundFault", "gone").into();
        assert_eq!(err.remote().map(|e| e.code.as_str()), Some("DBClusterNotFoundFault"));
        assert!(!err.is_cancelled());
    }
}
