//! Error types for load sequencing

use crate::key::LoadKey;
use crate::state::Phase;
use rig_intercept::InterceptError;

/// Sequencer construction and usage errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    /// Load name not registered
    #[error("unknown load {0}")]
    UnknownLoad(LoadKey),

    /// Load name registered twice
    #[error("load {0} registered twice")]
    DuplicateLoad(LoadKey),

    /// Load declared to depend on itself
    #[error("load {0} cannot depend on itself")]
    SelfDependency(LoadKey),

    /// Same dependency declared twice
    #[error("dependency {dependent} -> {prerequisite} declared twice")]
    DuplicateDependency {
        /// Load that waits
        dependent: LoadKey,
        /// Load waited on
        prerequisite: LoadKey,
    },

    /// Dependency would close a cycle
    #[error("dependency {dependent} -> {prerequisite} would create a cycle")]
    Cycle {
        /// Load that waits
        dependent: LoadKey,
        /// Load waited on
        prerequisite: LoadKey,
    },

    /// State store refused a transition
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Illegal load state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition not in the table
    #[error("illegal transition {from:?} -> {to:?}")]
    Illegal {
        /// Current phase
        from: Phase,
        /// Requested phase
        to: Phase,
    },
}

/// Why a load failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FailureReason {
    /// Backend answered with a non-2xx status
    #[error("status {0}")]
    Status(u16),

    /// Transport could not answer (fixture gap, malformed request, ...)
    #[error(transparent)]
    Transport(#[from] InterceptError),

    /// The operation could not build its request or read its response
    #[error("{0}")]
    Operation(String),

    /// A prerequisite failed, so this load was never issued
    #[error("prerequisite {0} failed")]
    Prerequisite(LoadKey),
}

/// A failed load, surfaced to whoever reads load state
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("load {key} failed: {reason}")]
pub struct LoadFailure {
    /// Load that failed
    pub key: LoadKey,
    /// Cause
    pub reason: FailureReason,
}

impl LoadFailure {
    /// Create failure
    #[inline]
    pub fn new(key: impl Into<LoadKey>, reason: FailureReason) -> Self {
        Self {
            key: key.into(),
            reason,
        }
    }

    /// Check if the failure comes from missing fixtures
    #[inline]
    #[must_use]
    pub fn is_fixture_gap(&self) -> bool {
        matches!(&self.reason, FailureReason::Transport(e) if e.is_fixture_gap())
    }

    /// Check if the load was blocked rather than attempted
    #[inline]
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self.reason, FailureReason::Prerequisite(_))
    }
}
