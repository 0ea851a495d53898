//! CLI commands

pub mod upgrade;
pub mod validate;
pub mod wait;

use std::time::Duration;

use serde::Serialize;
use settle_engine::CancellationToken;

use crate::error::CliError;

/// Error section of a JSON report
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
}

impl From<&CliError> for ErrorReport {
    fn from(err: &CliError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Token cancelled on Ctrl-C or once `deadline` elapses
///
/// Must be called from within the runtime.
pub fn cancellation(deadline: Option<Duration>) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = trigger.cancelled() => return,
            _ = tokio::signal::ctrl_c() => tracing::warn!("interrupted, cancelling"),
            _ = expired => tracing::warn!(?deadline, "deadline reached, cancelling"),
        }
        trigger.cancel();
    });

    token
}
