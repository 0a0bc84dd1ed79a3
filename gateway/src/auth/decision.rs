//! Authorization decisions
//!
//! A backend answers each (connection, topic) check with a [`BackendDecision`]:
//! allow for a number of milliseconds (zero meaning no expiry) or deny.
//! Only allows are ever retained, as a [`Decision`] anchored to an absolute
//! instant. Callers of the cache receive an [`AuthOutcome`].

use tokio::time::{Duration, Instant};

use crate::error::TopicAccessError;

/// Answer produced by a decision backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendDecision {
    /// Access granted for `ttl_millis`; zero grants access indefinitely.
    Allow { ttl_millis: u64 },
    /// Access refused.
    Denied { reason: String },
}

impl BackendDecision {
    pub fn allow(ttl_millis: u64) -> Self {
        BackendDecision::Allow { ttl_millis }
    }

    pub fn allow_indefinite() -> Self {
        BackendDecision::Allow { ttl_millis: 0 }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        BackendDecision::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, BackendDecision::Allow { .. })
    }
}

/// Decision held by the cache store. Denials are never represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { valid_until: Instant },
    AllowIndefinite,
}

impl Decision {
    /// Convert a backend answer received at `now`; `None` for denials.
    pub fn from_backend(decision: &BackendDecision, now: Instant) -> Option<Self> {
        match decision {
            BackendDecision::Allow { ttl_millis: 0 } => Some(Decision::AllowIndefinite),
            BackendDecision::Allow { ttl_millis } => Some(Decision::Allow {
                valid_until: now + Duration::from_millis(*ttl_millis),
            }),
            BackendDecision::Denied { .. } => None,
        }
    }

    /// Remaining time-to-live at `now` in whole milliseconds.
    ///
    /// Returns `Some(0)` for indefinite decisions and `None` once a finite
    /// decision has less than a millisecond left, since a finite allow must
    /// never be reported as zero.
    pub fn remaining_millis(&self, now: Instant) -> Option<u64> {
        match self {
            Decision::AllowIndefinite => Some(0),
            Decision::Allow { valid_until } => {
                let remaining = valid_until.saturating_duration_since(now).as_millis() as u64;
                (remaining > 0).then_some(remaining)
            }
        }
    }

    pub fn is_indefinite(&self) -> bool {
        matches!(self, Decision::AllowIndefinite)
    }
}

/// Outcome of a single `verify` call, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Allowed for `ttl_millis`; zero means indefinitely.
    Allow { ttl_millis: u64 },
    Deny(TopicAccessError),
}

impl AuthOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthOutcome::Allow { .. })
    }

    pub fn ttl_millis(&self) -> Option<u64> {
        match self {
            AuthOutcome::Allow { ttl_millis } => Some(*ttl_millis),
            AuthOutcome::Deny(_) => None,
        }
    }

    pub fn denial(&self) -> Option<&TopicAccessError> {
        match self {
            AuthOutcome::Allow { .. } => None,
            AuthOutcome::Deny(err) => Some(err),
        }
    }
}
