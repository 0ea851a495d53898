//! Cancellation-aware sleeping

use std::time::Duration;

use settle_core::{Result, SettleError};
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless `cancel` fires first
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SettleError::Cancelled);
    }

    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SettleError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
