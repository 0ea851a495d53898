//! Finite state machine for one upgrade invocation
//!
//! ```text
//! SelectingStrategy → AttemptingMajor ─┬─ MajorSucceeded ──────────────┐
//!                                      └─ FallBackToMinor              │
//!                                            ↓                         ↓
//!                      RetryMinor ⇄ AttemptingMinor ─────────────► Converged
//!                                   ↓ (any non-terminal phase)
//!                                 Failed
//! ```
//!
//! The machine lives for a single call and is never persisted.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, UpgradeError};

/// Phase of an upgrade invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpgradePhase {
    SelectingStrategy,
    AttemptingMajor,
    MajorSucceeded,
    FallBackToMinor,
    AttemptingMinor,
    RetryMinor,
    Converged,
    Failed,
}

impl UpgradePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradePhase::SelectingStrategy => "selecting-strategy",
            UpgradePhase::AttemptingMajor => "attempting-major",
            UpgradePhase::MajorSucceeded => "major-succeeded",
            UpgradePhase::FallBackToMinor => "fall-back-to-minor",
            UpgradePhase::AttemptingMinor => "attempting-minor",
            UpgradePhase::RetryMinor => "retry-minor",
            UpgradePhase::Converged => "converged",
            UpgradePhase::Failed => "failed",
        }
    }

    /// Whether no transition leaves this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpgradePhase::Converged | UpgradePhase::Failed)
    }
}

impl fmt::Display for UpgradePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move the upgrade between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpgradeEvent {
    /// The plan validated; the major path is always tried first
    PlanAccepted,
    /// The global cluster accepted the major version change
    MajorAccepted,
    /// The global cluster refused the change as a minor one
    MajorRefusedAsMinor,
    /// A per-member minor pass is starting
    MinorPassStarted,
    /// A pass ended on an ordering signal or an unconverged aggregate
    PassIncomplete,
    /// The aggregate re-read reports the target version
    AggregateConfirmed,
    /// A fatal error or cancellation
    ErrorOccurred,
}

impl fmt::Display for UpgradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Transition {
    from: UpgradePhase,
    to: UpgradePhase,
    event: UpgradeEvent,
    description: &'static str,
}

const fn transition(
    from: UpgradePhase,
    to: UpgradePhase,
    event: UpgradeEvent,
    description: &'static str,
) -> Transition {
    Transition {
        from,
        to,
        event,
        description,
    }
}

const TRANSITIONS: &[Transition] = &[
    transition(
        UpgradePhase::SelectingStrategy,
        UpgradePhase::AttemptingMajor,
        UpgradeEvent::PlanAccepted,
        "attempting major version upgrade",
    ),
    transition(
        UpgradePhase::AttemptingMajor,
        UpgradePhase::MajorSucceeded,
        UpgradeEvent::MajorAccepted,
        "major upgrade accepted, waiting for members",
    ),
    transition(
        UpgradePhase::AttemptingMajor,
        UpgradePhase::FallBackToMinor,
        UpgradeEvent::MajorRefusedAsMinor,
        "version change is minor, upgrading members individually",
    ),
    transition(
        UpgradePhase::MajorSucceeded,
        UpgradePhase::Converged,
        UpgradeEvent::AggregateConfirmed,
        "all members report the target version",
    ),
    transition(
        UpgradePhase::FallBackToMinor,
        UpgradePhase::AttemptingMinor,
        UpgradeEvent::MinorPassStarted,
        "starting first minor pass",
    ),
    transition(
        UpgradePhase::AttemptingMinor,
        UpgradePhase::RetryMinor,
        UpgradeEvent::PassIncomplete,
        "minor pass did not converge",
    ),
    transition(
        UpgradePhase::RetryMinor,
        UpgradePhase::AttemptingMinor,
        UpgradeEvent::MinorPassStarted,
        "starting another minor pass",
    ),
    transition(
        UpgradePhase::AttemptingMinor,
        UpgradePhase::Converged,
        UpgradeEvent::AggregateConfirmed,
        "all members report the target version",
    ),
];

/// Tracks the current phase and rejects transitions outside the table
#[derive(Debug)]
pub struct UpgradeStateMachine {
    phase: UpgradePhase,
}

impl Default for UpgradeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl UpgradeStateMachine {
    pub fn new() -> Self {
        Self {
            phase: UpgradePhase::SelectingStrategy,
        }
    }

    pub fn phase(&self) -> UpgradePhase {
        self.phase
    }

    /// Phase reached by `event` from the current phase, if allowed
    pub fn next(&self, event: UpgradeEvent) -> Option<UpgradePhase> {
        if event == UpgradeEvent::ErrorOccurred {
            return (!self.phase.is_terminal()).then_some(UpgradePhase::Failed);
        }
        TRANSITIONS
            .iter()
            .find(|t| t.from == self.phase && t.event == event)
            .map(|t| t.to)
    }

    /// Apply `event`, returning the new phase
    pub fn fire(&mut self, event: UpgradeEvent) -> Result<UpgradePhase> {
        let Some(to) = self.next(event) else {
            return Err(UpgradeError::InvalidTransition {
                from: self.phase,
                to: expected_target(event).unwrap_or(self.phase),
            });
        };

        let description = TRANSITIONS
            .iter()
            .find(|t| t.from == self.phase && t.to == to)
            .map(|t| t.description)
            .unwrap_or("upgrade failed");

        tracing::info!(from = %self.phase, to = %to, %event, "{description}");
        self.phase = to;
        Ok(to)
    }

    /// Events accepted from the current phase
    pub fn valid_events(&self) -> Vec<UpgradeEvent> {
        let mut events: Vec<UpgradeEvent> = TRANSITIONS
            .iter()
            .filter(|t| t.from == self.phase)
            .map(|t| t.event)
            .collect();
        if !self.phase.is_terminal() {
            events.push(UpgradeEvent::ErrorOccurred);
        }
        events
    }
}

fn expected_target(event: UpgradeEvent) -> Option<UpgradePhase> {
    match event {
        UpgradeEvent::ErrorOccurred => Some(UpgradePhase::Failed),
        _ => TRANSITIONS.iter().find(|t| t.event == event).map(|t| t.to),
    }
}
