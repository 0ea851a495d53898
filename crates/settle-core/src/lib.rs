//! Settle Core - shared types for waiting on eventually-consistent services
//!
//! This crate provides:
//! - **Statuses**: the `Status` bound used by the engines and the validated `Label` newtype
//! - **Wait specifications**: pending/target/failure status sets with timing policy
//! - **Retry specifications**: mutation retry budgets with injectable classifiers
//! - **Error classification**: mapping structured remote errors to transient/not-found/fatal
//! - **Backoff**: exponential backoff with jitter for retried mutations

pub mod backoff;
pub mod classify;
pub mod error;
pub mod observation;
pub mod spec;
pub mod status;

pub use backoff::BackoffConfig;
pub use classify::{Classifier, ErrorClass, Rule, RuleClassifier};
pub use error::{RemoteError, Result, SettleError};
pub use observation::Observation;
pub use spec::{NotFoundPolicy, PollTiming, RetrySpec, WaitSpec};
pub use status::{Label, Status};
