//! Load state lifecycle
//!
//! `Unloaded → Loading → {Loaded | Failed}`. `Loaded` and `Failed` are
//! terminal for the lifetime of a sequencer.

use crate::error::{LoadFailure, TransitionError};
use rig_intercept::Payload;
use serde::Serialize;
use std::sync::Arc;

/// Phase of a load state, without its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not requested, or requested and waiting on prerequisites
    Unloaded,
    /// Request issued, response pending
    Loading,
    /// Value available
    Loaded,
    /// Request failed
    Failed,
}

/// Validates a phase transition.
///
/// With the `strict-debug` feature an illegal transition panics instead of
/// returning an error.
///
/// # Errors
/// `TransitionError::Illegal` if `to` is not reachable from `from`
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal load transition attempted: {from:?} -> {to:?}");

        Err(TransitionError::Illegal { from, to })
    }
}

/// Phases reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: Phase) -> &'static [Phase] {
    use Phase::*;
    match from {
        Unloaded => &[Loading],
        Loading => &[Loaded, Failed],
        Loaded | Failed => &[],
    }
}

/// A named piece of asynchronously obtained data
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState {
    /// Nothing issued yet
    #[default]
    Unloaded,
    /// Issued, awaiting response
    Loading,
    /// Response payload
    Loaded(Arc<Payload>),
    /// Failure, surfaced to readers
    Failed(LoadFailure),
}

impl LoadState {
    /// Phase of this state
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Unloaded => Phase::Unloaded,
            Self::Loading => Phase::Loading,
            Self::Loaded(_) => Phase::Loaded,
            Self::Failed(_) => Phase::Failed,
        }
    }

    /// Loaded value, if any
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Arc<Payload>> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// Failure, if any
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&LoadFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Check if the state reached a terminal phase
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Loaded(_) | Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lifecycle_transitions() {
        assert!(validate_transition(Phase::Unloaded, Phase::Loading).is_ok());
        assert!(validate_transition(Phase::Loading, Phase::Loaded).is_ok());
        assert!(validate_transition(Phase::Loading, Phase::Failed).is_ok());
    }

    #[cfg(not(feature = "strict-debug"))]
    #[test]
    fn illegal_transitions() {
        assert!(validate_transition(Phase::Unloaded, Phase::Loaded).is_err());
        assert!(validate_transition(Phase::Loading, Phase::Loading).is_err());
        assert!(validate_transition(Phase::Loaded, Phase::Loading).is_err());
        assert_eq!(
            validate_transition(Phase::Failed, Phase::Loading),
            Err(TransitionError::Illegal {
                from: Phase::Failed,
                to: Phase::Loading
            })
        );
    }

    #[test]
    fn settled_states() {
        assert!(!LoadState::Unloaded.is_settled());
        assert!(!LoadState::Loading.is_settled());
        assert!(LoadState::Loaded(Arc::new(Payload::Json(serde_json::json!(1)))).is_settled());
    }

    fn phase() -> impl Strategy<Value = Phase> {
        prop_oneof![
            Just(Phase::Unloaded),
            Just(Phase::Loading),
            Just(Phase::Loaded),
            Just(Phase::Failed),
        ]
    }

    #[cfg(not(feature = "strict-debug"))]
    proptest! {
        #[test]
        fn prop_validation_agrees_with_table(from in phase(), to in phase()) {
            let res = validate_transition(from, to);
            prop_assert_eq!(res.is_ok(), allowed_transitions(from).contains(&to));
        }

        #[test]
        fn prop_no_transition_returns_to_unloaded(from in phase()) {
            prop_assert!(!allowed_transitions(from).contains(&Phase::Unloaded));
        }
    }
}
