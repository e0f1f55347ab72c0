//! Reactive load state store
//!
//! One `tokio::sync::watch` channel per load. Readers get the current value
//! or a receiver that wakes only when *that* load changes; nothing else in
//! the store can wake it.

use crate::error::TransitionError;
use crate::key::LoadKey;
use crate::state::{validate_transition, LoadState, Phase};
use std::collections::HashMap;
use tokio::sync::watch;

/// Per-load reactive state
#[derive(Debug)]
pub struct StateStore {
    channels: HashMap<LoadKey, watch::Sender<LoadState>>,
}

impl StateStore {
    /// Create a store with every key `Unloaded`
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a LoadKey>) -> Self {
        let channels = keys
            .into_iter()
            .map(|key| (key.clone(), watch::channel(LoadState::Unloaded).0))
            .collect();
        Self { channels }
    }

    /// Current state of a load
    #[must_use]
    pub fn read(&self, key: &str) -> Option<LoadState> {
        self.channels.get(key).map(|tx| tx.borrow().clone())
    }

    /// Current phase of a load
    #[must_use]
    pub fn phase(&self, key: &str) -> Option<Phase> {
        self.channels.get(key).map(|tx| tx.borrow().phase())
    }

    /// Subscribe to one load's changes
    #[must_use]
    pub fn subscribe(&self, key: &str) -> Option<watch::Receiver<LoadState>> {
        self.channels.get(key).map(watch::Sender::subscribe)
    }

    /// All keys
    pub fn keys(&self) -> impl Iterator<Item = &LoadKey> {
        self.channels.keys()
    }

    /// Move a load to its next state
    ///
    /// Only the sequencer writes. Receivers are notified even when none
    /// exist yet, so late subscribers still see the latest value.
    pub(crate) fn transition(&self, key: &LoadKey, next: LoadState) -> Result<(), TransitionError> {
        let Some(tx) = self.channels.get(key) else {
            return Ok(());
        };
        let from = tx.borrow().phase();
        validate_transition(from, next.phase())?;
        tracing::debug!(load = %key, ?from, to = ?next.phase(), "load transition");
        tx.send_replace(next);
        Ok(())
    }
}
