//! Settle Engine - generic waiters over eventually-consistent services
//!
//! This crate provides:
//! - **Poll Engine**: repeatedly observe an entity until it reaches a target
//!   status, a failure status, or the budget runs out
//! - **Retry Engine**: retry a single mutation while its errors classify as
//!   transient, with one final attempt after the budget expires
//!
//! Both engines sleep only between calls and stop promptly when the caller's
//! `CancellationToken` fires.

pub mod cancel;
pub mod poll;
pub mod retry;

pub use cancel::sleep_or_cancel;
pub use poll::wait_for_status;
pub use retry::retry;
pub use tokio_util::sync::CancellationToken;
