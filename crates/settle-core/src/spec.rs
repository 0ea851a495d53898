//! Wait and retry specifications
//!
//! Both are built per call and discarded afterwards; nothing in them
//! survives between invocations.

use std::collections::HashSet;
use std::time::Duration;

use crate::backoff::BackoffConfig;
use crate::classify::Classifier;
use crate::error::{Result, SettleError};
use crate::status::{Status, describe_set};

/// Default number of consecutive not-found observations tolerated
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Timing of a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// Sleep before the first observation, letting a mutation propagate
    pub delay: Duration,
    /// Sleep between observations
    pub interval: Duration,
    /// Floor applied to `interval`
    pub min_interval: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(30),
            interval: Duration::from_secs(10),
            min_interval: Duration::from_secs(10),
        }
    }
}

impl PollTiming {
    /// Timing with no initial delay and a fixed interval
    pub fn every(interval: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            interval,
            min_interval: Duration::ZERO,
        }
    }

    /// The interval actually slept between ticks
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(self.min_interval)
    }
}

/// What to do when the entity is reported absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFoundPolicy {
    /// Consecutive not-found observations treated as still pending
    pub tolerance: u32,
    /// Whether absence is a successful terminal state once tolerance is exhausted
    pub accept_as_terminal: bool,
}

impl Default for NotFoundPolicy {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_NOT_FOUND_CHECKS,
            accept_as_terminal: false,
        }
    }
}

/// Configuration of one poll operation
#[derive(Debug, Clone)]
pub struct WaitSpec<S: Status> {
    pub pending: HashSet<S>,
    pub target: HashSet<S>,
    pub failure: HashSet<S>,
    pub timeout: Duration,
    pub timing: PollTiming,
    pub not_found: NotFoundPolicy,
    /// Target observations needed in a row before succeeding
    pub required_consecutive_target_hits: u32,
}

impl<S: Status> WaitSpec<S> {
    /// Create a spec waiting for `target` while the entity is in `pending`
    pub fn new(
        pending: impl IntoIterator<Item = S>,
        target: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            pending: pending.into_iter().collect(),
            target: target.into_iter().collect(),
            failure: HashSet::new(),
            timeout: Duration::from_secs(20 * 60),
            timing: PollTiming::default(),
            not_found: NotFoundPolicy::default(),
            required_consecutive_target_hits: 1,
        }
    }

    /// Statuses that abort the wait
    pub fn failure(mut self, failure: impl IntoIterator<Item = S>) -> Self {
        self.failure = failure.into_iter().collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timing(mut self, timing: PollTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Consecutive not-found observations tolerated before giving up
    pub fn not_found_tolerance(mut self, tolerance: u32) -> Self {
        self.not_found.tolerance = tolerance;
        self
    }

    /// Treat absence as success once the not-found tolerance is exhausted
    pub fn accept_not_found(mut self) -> Self {
        self.not_found.accept_as_terminal = true;
        self
    }

    pub fn consecutive_target_hits(mut self, hits: u32) -> Self {
        self.required_consecutive_target_hits = hits;
        self
    }

    /// Check the spec for contradictions
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() && !self.not_found.accept_as_terminal {
            return Err(SettleError::InvalidConfig(
                "target statuses cannot be empty unless not-found is accepted".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(SettleError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }

        if self.required_consecutive_target_hits == 0 {
            return Err(SettleError::InvalidConfig(
                "required consecutive target hits must be at least 1".to_string(),
            ));
        }

        let overlaps = [
            ("pending", &self.pending, "target", &self.target),
            ("pending", &self.pending, "failure", &self.failure),
            ("target", &self.target, "failure", &self.failure),
        ];
        for (a_name, a, b_name, b) in overlaps {
            let shared: Vec<&S> = a.intersection(b).collect();
            if !shared.is_empty() {
                return Err(SettleError::InvalidConfig(format!(
                    "statuses [{}] are both {} and {}",
                    describe_set(shared),
                    a_name,
                    b_name
                )));
            }
        }

        Ok(())
    }

    /// Human-readable description of the awaited outcome
    pub fn expected(&self) -> String {
        if self.target.is_empty() {
            "<absent>".to_string()
        } else {
            describe_set(self.target.iter())
        }
    }
}

/// Configuration of one retried mutation
#[derive(Debug, Clone)]
pub struct RetrySpec<C: Classifier> {
    /// Nominal budget; one final attempt is always made after it expires
    pub timeout: Duration,
    pub backoff: BackoffConfig,
    pub classifier: C,
}

impl<C: Classifier> RetrySpec<C> {
    pub fn new(timeout: Duration, classifier: C) -> Self {
        Self {
            timeout,
            backoff: BackoffConfig::default(),
            classifier,
        }
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Label;

    fn labels(names: &[&str]) -> Vec<Label> {
        names.iter().map(|n| Label::new(*n).unwrap()).collect()
    }

    #[test]
    fn test_defaults() {
        let spec = WaitSpec::new(labels(&["creating"]), labels(&["available"]));
        assert_eq!(spec.required_consecutive_target_hits, 1);
        assert_eq!(spec.not_found.tolerance, DEFAULT_NOT_FOUND_CHECKS);
        assert!(!spec.not_found.accept_as_terminal);
        assert!(spec.validate().is_ok());
        assert_eq!(spec.expected(), "available");
    }

    #[test]
    fn test_empty_target_requires_accepted_not_found() {
        let spec = WaitSpec::new(labels(&["deleting"]), Vec::new());
        assert!(spec.validate().is_err());

        let spec = spec.accept_not_found().not_found_tolerance(0);
        assert!(spec.validate().is_ok());
        assert_eq!(spec.expected(), "<absent>");
    }

    #[test]
    fn test_overlapping_sets_rejected() {
        let spec = WaitSpec::new(labels(&["creating", "available"]), labels(&["available"]));
        let err = spec.validate().unwrap_err().to_string();
        assert!(err.contains("available"));
        assert!(err.contains("pending and target"));

        let spec = WaitSpec::new(labels(&["creating"]), labels(&["available"]))
            .failure(labels(&["available"]));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_zero_values_rejected() {
        let base = WaitSpec::new(labels(&["creating"]), labels(&["available"]));
        assert!(base.clone().timeout(Duration::ZERO).validate().is_err());
        assert!(base.consecutive_target_hits(0).validate().is_err());
    }

    #[test]
    fn test_effective_interval_floor() {
        let timing = PollTiming {
            delay: Duration::ZERO,
            interval: Duration::from_secs(1),
            min_interval: Duration::from_secs(10),
        };
        assert_eq!(timing.effective_interval(), Duration::from_secs(10));
        assert_eq!(
            PollTiming::every(Duration::from_millis(250)).effective_interval(),
            Duration::from_millis(250)
        );
    }
}
