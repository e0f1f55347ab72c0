//! Ordered record of what the sequencer did
//!
//! Append-only. Sequence numbers are assigned under the same lock as the
//! append, so `seq` order is the order events happened in.

use crate::graph::DependencyGraph;
use crate::key::LoadKey;
use crate::state::Phase;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// What happened to a load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEventKind {
    /// `start_load` called
    Requested,
    /// Start postponed until prerequisites are loaded
    Deferred {
        /// Prerequisites not yet loaded
        waiting_on: Vec<LoadKey>,
    },
    /// Operation issued against the transport
    Issued,
    /// Operation finished
    Settled {
        /// `Loaded` or `Failed`
        phase: Phase,
    },
    /// A prerequisite failed; the load will never be issued
    Blocked {
        /// Failed prerequisite
        by: LoadKey,
    },
    /// Result arrived after the session ended and was dropped
    Discarded,
}

/// One trace entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    /// Position in the trace
    pub seq: u64,
    /// Load concerned
    pub key: LoadKey,
    /// What happened
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

/// Ordering constraint broken in a trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum OrderingViolation {
    /// A dependent was issued before its prerequisite settled as loaded
    #[error("{load} issued at #{issued_at} before {prerequisite} was loaded")]
    IssuedBeforePrerequisite {
        /// Dependent load
        load: LoadKey,
        /// Prerequisite not yet loaded
        prerequisite: LoadKey,
        /// Sequence number of the issue
        issued_at: u64,
    },
    /// A load was issued more than once
    #[error("{load} issued {count} times")]
    DuplicateIssue {
        /// Load issued repeatedly
        load: LoadKey,
        /// Number of issues
        count: usize,
    },
}

/// Append-only sequencer trace
#[derive(Debug, Default)]
pub struct Trace {
    inner: Mutex<Vec<TraceEvent>>,
}

impl Trace {
    /// Create empty trace
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn record(&self, key: &LoadKey, kind: TraceEventKind) -> u64 {
        let mut guard = self.inner.lock();
        let seq = guard.len() as u64;
        tracing::trace!(seq, load = %key, ?kind, "trace");
        guard.push(TraceEvent {
            seq,
            key: key.clone(),
            kind,
        });
        seq
    }

    /// Snapshot of all events
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.inner.lock().clone()
    }

    /// Events for one load
    #[must_use]
    pub fn events_for(&self, key: &str) -> Vec<TraceEvent> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.key.as_str() == key)
            .cloned()
            .collect()
    }

    /// Number of times a load was issued
    #[must_use]
    pub fn issued_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.key.as_str() == key && e.kind == TraceEventKind::Issued)
            .count()
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Check every issue against the graph
    ///
    /// A load may be issued at most once, and only after each of its
    /// prerequisites has settled as `Loaded`.
    #[must_use]
    pub fn check_ordering(&self, graph: &DependencyGraph) -> Vec<OrderingViolation> {
        let events = self.inner.lock();
        let mut loaded_at: HashMap<&LoadKey, u64> = HashMap::new();
        let mut issues: HashMap<&LoadKey, usize> = HashMap::new();
        let mut violations = Vec::new();

        for event in events.iter() {
            match &event.kind {
                TraceEventKind::Settled {
                    phase: Phase::Loaded,
                } => {
                    loaded_at.entry(&event.key).or_insert(event.seq);
                }
                TraceEventKind::Issued => {
                    *issues.entry(&event.key).or_default() += 1;
                    for prerequisite in graph.prerequisites(event.key.as_str()) {
                        if !loaded_at.contains_key(&prerequisite) {
                            violations.push(OrderingViolation::IssuedBeforePrerequisite {
                                load: event.key.clone(),
                                prerequisite,
                                issued_at: event.seq,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        let mut duplicates: Vec<_> = issues
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .map(|(load, count)| OrderingViolation::DuplicateIssue {
                load: load.clone(),
                count,
            })
            .collect();
        duplicates.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        violations.extend(duplicates);
        violations
    }
}
