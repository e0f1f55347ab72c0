//! Load Sequencer
//!
//! Issues load operations honouring the dependency graph. A load whose
//! prerequisites are not all `Loaded` is parked; a waiter task subscribes to
//! exactly those prerequisites' states and issues the load the first time
//! they are all settled. The caller never blocks and nothing polls.
//!
//! Every resumption point (operation completed, waiter woke) takes the
//! bookkeeping lock and checks the session is still live before touching
//! state.

use crate::error::{FailureReason, LoadFailure, SequencerError};
use crate::graph::DependencyGraph;
use crate::key::LoadKey;
use crate::operation::{LoadContext, LoadOperation};
use crate::state::{LoadState, Phase};
use crate::store::StateStore;
use crate::trace::{Trace, TraceEventKind};
use parking_lot::Mutex;
use rig_intercept::{Payload, Transport};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::AbortHandle;

/// Sequencer policy knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencerConfig {
    /// Starting a deferred load also starts its unloaded prerequisites
    pub start_prerequisites: bool,
}

impl SequencerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set prerequisite auto-start
    #[inline]
    #[must_use]
    pub fn with_start_prerequisites(mut self, enabled: bool) -> Self {
        self.start_prerequisites = enabled;
        self
    }
}

/// Result of a `start_load` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// Operation issued now
    Issued,
    /// Parked until these prerequisites are loaded
    Deferred {
        /// Prerequisites not yet loaded
        waiting_on: Vec<LoadKey>,
    },
    /// Already in flight; nothing done
    AlreadyLoading,
    /// Already parked; nothing done
    AlreadyPending,
    /// Already loaded; nothing done
    AlreadyLoaded,
    /// Already failed; loads are not retried
    AlreadyFailed,
    /// A prerequisite failed, so this load will never be issued
    Blocked {
        /// Failed prerequisite
        by: LoadKey,
    },
    /// The session ended; nothing done
    SessionEnded,
}

/// Declares loads and dependencies, then builds a [`Sequencer`]
pub struct SequencerBuilder {
    transport: Arc<dyn Transport>,
    config: SequencerConfig,
    graph: DependencyGraph,
    ops: HashMap<LoadKey, Arc<dyn LoadOperation>>,
}

impl SequencerBuilder {
    /// Create builder sending requests through `transport`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: SequencerConfig::default(),
            graph: DependencyGraph::new(),
            ops: HashMap::new(),
        }
    }

    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: SequencerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a load
    ///
    /// # Errors
    /// `SequencerError::DuplicateLoad` if the name is taken
    pub fn add_load(
        &mut self,
        key: impl Into<LoadKey>,
        op: impl LoadOperation + 'static,
    ) -> Result<(), SequencerError> {
        self.add_shared_load(key, Arc::new(op))
    }

    /// Register a load with a shared operation
    ///
    /// # Errors
    /// `SequencerError::DuplicateLoad` if the name is taken
    pub fn add_shared_load(
        &mut self,
        key: impl Into<LoadKey>,
        op: Arc<dyn LoadOperation>,
    ) -> Result<(), SequencerError> {
        let key = key.into();
        self.graph.add_load(key.clone())?;
        self.ops.insert(key, op);
        Ok(())
    }

    /// Declare that `dependent` is issued only after `prerequisite` is loaded
    ///
    /// # Errors
    /// See [`DependencyGraph::add_dependency`]
    pub fn add_dependency(
        &mut self,
        dependent: impl Into<LoadKey>,
        prerequisite: impl Into<LoadKey>,
    ) -> Result<(), SequencerError> {
        self.graph
            .add_dependency(&dependent.into(), &prerequisite.into())
    }

    /// Number of registered loads
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Check if no loads are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Freeze the declarations
    #[must_use]
    pub fn build(self) -> Sequencer {
        let store = StateStore::new(self.graph.keys());
        tracing::debug!(loads = self.graph.len(), "sequencer built");
        Sequencer {
            inner: Arc::new(Inner {
                graph: self.graph,
                ops: self.ops,
                store,
                transport: self.transport,
                config: self.config,
                trace: Trace::new(),
                book: Mutex::new(Book::new()),
                idle: Notify::new(),
            }),
        }
    }
}

/// Bookkeeping guarded by one lock
#[derive(Debug)]
struct Book {
    live: bool,
    pending: HashMap<LoadKey, AbortHandle>,
    blocked: HashMap<LoadKey, LoadKey>,
    in_flight: usize,
    failures: Vec<LoadFailure>,
}

impl Book {
    fn new() -> Self {
        Self {
            live: true,
            pending: HashMap::new(),
            blocked: HashMap::new(),
            in_flight: 0,
            failures: Vec::new(),
        }
    }
}

struct Inner {
    graph: DependencyGraph,
    ops: HashMap<LoadKey, Arc<dyn LoadOperation>>,
    store: StateStore,
    transport: Arc<dyn Transport>,
    config: SequencerConfig,
    trace: Trace,
    book: Mutex<Book>,
    idle: Notify,
}

/// Runs loads for one harness session
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("graph", &self.inner.graph)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Sequencer {
    /// Fire-and-forget trigger for a load
    ///
    /// Issues the load when every prerequisite is `Loaded`, parks it
    /// otherwise. Calling again while loading or parked does nothing.
    ///
    /// # Errors
    /// `SequencerError::UnknownLoad` if the name is not registered
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn start_load(&self, key: &str) -> Result<StartOutcome, SequencerError> {
        let key = self.inner.key(key)?;
        self.inner.trace.record(&key, TraceEventKind::Requested);

        let (outcome, to_start) = {
            let mut book = self.inner.book.lock();
            Inner::start_locked(&self.inner, &mut book, &key)?
        };

        tracing::debug!(load = %key, ?outcome, "start load");
        for prerequisite in to_start {
            self.start_load(prerequisite.as_str())?;
        }
        self.inner.idle.notify_waiters();
        Ok(outcome)
    }

    /// End the session
    ///
    /// Parked loads are dropped. Results of in-flight loads are discarded
    /// when they arrive; their state stays as it is.
    pub fn end_session(&self) {
        let mut book = self.inner.book.lock();
        if !book.live {
            return;
        }
        book.live = false;
        let mut parked: Vec<_> = book.pending.drain().collect();
        parked.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, waiter) in parked {
            waiter.abort();
            self.inner.trace.record(&key, TraceEventKind::Discarded);
        }
        tracing::info!(in_flight = book.in_flight, "session ended");
        drop(book);
        self.inner.idle.notify_waiters();
    }

    /// Check if the session is still live
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.book.lock().live
    }

    /// Wait until nothing can make progress
    ///
    /// Returns once no operation is in flight and every parked load is
    /// waiting on a prerequisite nobody started.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.is_quiescent() {
                return;
            }
            notified.await;
        }
    }

    /// Current state of a load
    #[must_use]
    pub fn state(&self, key: &str) -> Option<LoadState> {
        self.inner.store.read(key)
    }

    /// Current phase of a load
    #[must_use]
    pub fn phase(&self, key: &str) -> Option<Phase> {
        self.inner.store.phase(key)
    }

    /// Subscribe to one load's state
    #[must_use]
    pub fn subscribe(&self, key: &str) -> Option<watch::Receiver<LoadState>> {
        self.inner.store.subscribe(key)
    }

    /// Failures so far, including blocked loads, in the order they happened
    #[must_use]
    pub fn failures(&self) -> Vec<LoadFailure> {
        self.inner.book.lock().failures.clone()
    }

    /// Loads parked on prerequisites
    #[must_use]
    pub fn pending(&self) -> Vec<LoadKey> {
        let mut keys: Vec<_> = self.inner.book.lock().pending.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of operations in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.book.lock().in_flight
    }

    /// Execution trace
    #[must_use]
    pub fn trace(&self) -> &Trace {
        &self.inner.trace
    }

    /// Dependency graph
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.inner.graph
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> SequencerConfig {
        self.inner.config
    }
}

impl Inner {
    fn key(&self, key: &str) -> Result<LoadKey, SequencerError> {
        self.ops
            .get_key_value(key)
            .map(|(k, _)| k.clone())
            .ok_or_else(|| SequencerError::UnknownLoad(key.into()))
    }

    /// Decide what a start does; returns prerequisites to auto-start
    fn start_locked(
        this: &Arc<Self>,
        book: &mut Book,
        key: &LoadKey,
    ) -> Result<(StartOutcome, Vec<LoadKey>), SequencerError> {
        if !book.live {
            return Ok((StartOutcome::SessionEnded, Vec::new()));
        }
        match this.store.phase(key.as_str()) {
            Some(Phase::Loading) => return Ok((StartOutcome::AlreadyLoading, Vec::new())),
            Some(Phase::Loaded) => return Ok((StartOutcome::AlreadyLoaded, Vec::new())),
            Some(Phase::Failed) => return Ok((StartOutcome::AlreadyFailed, Vec::new())),
            Some(Phase::Unloaded) | None => {}
        }
        if book.pending.contains_key(key) {
            return Ok((StartOutcome::AlreadyPending, Vec::new()));
        }
        if let Some(by) = book.blocked.get(key) {
            return Ok((StartOutcome::Blocked { by: by.clone() }, Vec::new()));
        }

        let mut waiting_on = Vec::new();
        for prerequisite in this.graph.prerequisites(key.as_str()) {
            if let Some(by) = this.blocker(book, &prerequisite) {
                this.block(book, key, by.clone());
                return Ok((StartOutcome::Blocked { by }, Vec::new()));
            }
            if this.store.phase(prerequisite.as_str()) != Some(Phase::Loaded) {
                waiting_on.push(prerequisite);
            }
        }

        if waiting_on.is_empty() {
            this.issue(book, key)?;
            return Ok((StartOutcome::Issued, Vec::new()));
        }

        this.trace.record(
            key,
            TraceEventKind::Deferred {
                waiting_on: waiting_on.clone(),
            },
        );
        let waiter = tokio::spawn(Arc::clone(this).await_prerequisites(key.clone(), waiting_on.clone()));
        book.pending.insert(key.clone(), waiter.abort_handle());

        let to_start = if this.config.start_prerequisites {
            waiting_on
                .iter()
                .filter(|p| {
                    this.store.phase(p.as_str()) == Some(Phase::Unloaded)
                        && !book.pending.contains_key(*p)
                })
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        Ok((StartOutcome::Deferred { waiting_on }, to_start))
    }

    /// The load a prerequisite's failure is attributed to, if any
    fn blocker(&self, book: &Book, prerequisite: &LoadKey) -> Option<LoadKey> {
        if self.store.phase(prerequisite.as_str()) == Some(Phase::Failed) || book.blocked.contains_key(prerequisite) {
            Some(prerequisite.clone())
        } else {
            None
        }
    }

    /// Mark a load as never issuable, and everything parked behind it
    fn block(&self, book: &mut Book, key: &LoadKey, by: LoadKey) {
        let mut stack = vec![(key.clone(), by)];
        while let Some((load, by)) = stack.pop() {
            if let Some(waiter) = book.pending.remove(&load) {
                waiter.abort();
            }
            tracing::warn!(load = %load, blocked_by = %by, "load blocked by failed prerequisite");
            self.trace
                .record(&load, TraceEventKind::Blocked { by: by.clone() });
            book.blocked.insert(load.clone(), by.clone());
            book.failures
                .push(LoadFailure::new(&load, FailureReason::Prerequisite(by)));
            stack.extend(self.parked_dependents(book, &load));
        }
    }

    fn parked_dependents(&self, book: &Book, key: &LoadKey) -> Vec<(LoadKey, LoadKey)> {
        self.graph
            .dependents(key.as_str())
            .into_iter()
            .filter(|d| book.pending.contains_key(d))
            .map(|d| (d, key.clone()))
            .collect()
    }

    /// Move a load to `Loading` and spawn its operation
    fn issue(self: &Arc<Self>, book: &mut Book, key: &LoadKey) -> Result<(), SequencerError> {
        let Some(op) = self.ops.get(key).cloned() else {
            return Err(SequencerError::UnknownLoad(key.clone()));
        };
        let prerequisites: HashMap<LoadKey, Arc<Payload>> = self
            .graph
            .prerequisites(key.as_str())
            .into_iter()
            .filter_map(|p| {
                let value = self.store.read(p.as_str())?.value().cloned()?;
                Some((p, value))
            })
            .collect();

        self.store.transition(key, LoadState::Loading)?;
        book.in_flight += 1;
        self.trace.record(key, TraceEventKind::Issued);

        let ctx = LoadContext::new(key.clone(), Arc::clone(&self.transport), prerequisites);
        tokio::spawn(Arc::clone(self).run_load(op, ctx));
        Ok(())
    }

    async fn run_load(self: Arc<Self>, op: Arc<dyn LoadOperation>, ctx: LoadContext) {
        let result = op.load(&ctx).await;
        let key = ctx.key();

        let mut book = self.book.lock();
        book.in_flight = book.in_flight.saturating_sub(1);

        if !book.live {
            tracing::debug!(load = %key, "session ended before load resolved; result discarded");
            self.trace.record(key, TraceEventKind::Discarded);
        } else {
            let settled = match result {
                Ok(payload) => LoadState::Loaded(Arc::new(payload)),
                Err(failure) => {
                    tracing::warn!(load = %key, error = %failure, "load failed");
                    book.failures.push(failure.clone());
                    LoadState::Failed(failure)
                }
            };
            let phase = settled.phase();
            self.trace.record(key, TraceEventKind::Settled { phase });
            if let Err(e) = self.store.transition(key, settled) {
                tracing::error!(load = %key, error = %e, "load settled from unexpected state");
            }
            if phase == Phase::Failed {
                for (dependent, by) in self.parked_dependents(&book, key) {
                    self.block(&mut book, &dependent, by);
                }
            }
        }

        drop(book);
        self.idle.notify_waiters();
    }

    /// Waiter for a parked load
    ///
    /// Subscribes only to the listed prerequisites; unrelated state changes
    /// never wake it.
    async fn await_prerequisites(self: Arc<Self>, key: LoadKey, waiting_on: Vec<LoadKey>) {
        for prerequisite in &waiting_on {
            let Some(mut rx) = self.store.subscribe(prerequisite.as_str()) else {
                continue;
            };
            let settled = rx.wait_for(LoadState::is_settled).await.map(|_| ());
            if settled.is_err() {
                return;
            }
        }
        self.advance(&key);
    }

    /// Re-examine a parked load once its prerequisites settled
    fn advance(self: &Arc<Self>, key: &LoadKey) {
        let mut book = self.book.lock();
        if !book.live || !book.pending.contains_key(key) {
            return;
        }

        let mut ready = true;
        for prerequisite in self.graph.prerequisites(key.as_str()) {
            if let Some(by) = self.blocker(&book, &prerequisite) {
                self.block(&mut book, key, by);
                drop(book);
                self.idle.notify_waiters();
                return;
            }
            ready &= self.store.phase(prerequisite.as_str()) == Some(Phase::Loaded);
        }

        if ready {
            book.pending.remove(key);
            if let Err(e) = self.issue(&mut book, key) {
                tracing::error!(load = %key, error = %e, "could not issue parked load");
            }
        }
        drop(book);
        self.idle.notify_waiters();
    }

    fn is_quiescent(&self) -> bool {
        let book = self.book.lock();
        if book.in_flight > 0 {
            return false;
        }
        book.pending.keys().all(|key| {
            self.graph
                .prerequisites(key.as_str())
                .iter()
                .any(|p| self.store.phase(p.as_str()) == Some(Phase::Unloaded))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rig_intercept::RouteTable;
    use rig_intercept::{Interceptor, InterceptorConfig};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers from memory and counts calls
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LoadOperation for Arc<Counting> {
        async fn load(&self, ctx: &LoadContext) -> Result<Payload, LoadFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(ctx.fail(FailureReason::Status(500)));
            }
            Ok(Payload::Json(json!({"load": ctx.key().as_str()})))
        }
    }

    fn transport() -> Arc<dyn Transport> {
        Arc::new(Interceptor::new(RouteTable::builder().build(), InterceptorConfig::new()))
    }

    fn sequencer(fail_a: bool, config: SequencerConfig) -> (Sequencer, Arc<Counting>, Arc<Counting>) {
        let a = Arc::new(Counting {
            fail: fail_a,
            ..Counting::default()
        });
        let b = Arc::new(Counting::default());
        let mut builder = SequencerBuilder::new(transport()).with_config(config);
        builder.add_load("a", Arc::clone(&a)).unwrap();
        builder.add_load("b", Arc::clone(&b)).unwrap();
        builder.add_dependency("b", "a").unwrap();
        (builder.build(), a, b)
    }

    #[tokio::test]
    async fn unknown_load_is_an_error() {
        let (seq, _, _) = sequencer(false, SequencerConfig::new());
        assert_eq!(
            seq.start_load("zzz"),
            Err(SequencerError::UnknownLoad("zzz".into()))
        );
    }

    #[tokio::test]
    async fn dependent_waits_for_value() {
        let (seq, a, b) = sequencer(false, SequencerConfig::new());

        assert_eq!(
            seq.start_load("b").unwrap(),
            StartOutcome::Deferred {
                waiting_on: vec!["a".into()]
            }
        );
        assert_eq!(seq.start_load("b").unwrap(), StartOutcome::AlreadyPending);
        assert_eq!(seq.start_load("a").unwrap(), StartOutcome::Issued);
        assert_eq!(seq.start_load("a").unwrap(), StartOutcome::AlreadyLoading);
        assert_eq!(seq.phase("b"), Some(Phase::Unloaded));

        seq.settled().await;
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert_eq!(seq.phase("b"), Some(Phase::Loaded));
        assert!(seq.trace().check_ordering(seq.graph()).is_empty());
        assert_eq!(seq.start_load("b").unwrap(), StartOutcome::AlreadyLoaded);
    }

    #[tokio::test]
    async fn stalled_dependent_counts_as_settled() {
        let (seq, _, b) = sequencer(false, SequencerConfig::new());
        seq.start_load("b").unwrap();
        seq.settled().await;
        assert_eq!(seq.pending(), vec![LoadKey::from("b")]);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auto_start_prerequisites() {
        let (seq, a, _) = sequencer(false, SequencerConfig::new().with_start_prerequisites(true));
        seq.start_load("b").unwrap();
        seq.settled().await;
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(seq.phase("b"), Some(Phase::Loaded));
    }

    #[tokio::test]
    async fn failure_blocks_parked_dependent() {
        let (seq, _, b) = sequencer(true, SequencerConfig::new());
        seq.start_load("b").unwrap();
        seq.start_load("a").unwrap();
        seq.settled().await;

        assert_eq!(seq.phase("a"), Some(Phase::Failed));
        assert_eq!(seq.phase("b"), Some(Phase::Unloaded));
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
        assert!(seq.pending().is_empty());

        let failures = seq.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].reason, FailureReason::Status(500));
        assert!(failures[1].is_blocked());

        assert_eq!(
            seq.start_load("b").unwrap(),
            StartOutcome::Blocked { by: "a".into() }
        );
        assert_eq!(seq.start_load("a").unwrap(), StartOutcome::AlreadyFailed);
    }

    #[tokio::test]
    async fn start_after_failure_is_blocked() {
        let (seq, _, b) = sequencer(true, SequencerConfig::new());
        seq.start_load("a").unwrap();
        seq.settled().await;
        assert_eq!(
            seq.start_load("b").unwrap(),
            StartOutcome::Blocked { by: "a".into() }
        );
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
        assert_eq!(seq.failures().len(), 2);
    }

    #[tokio::test]
    async fn ended_session_discards_results() {
        let (seq, _, _) = sequencer(false, SequencerConfig::new());
        seq.start_load("a").unwrap();
        seq.start_load("b").unwrap();
        seq.end_session();
        seq.settled().await;

        assert!(!seq.is_live());
        assert_eq!(seq.phase("a"), Some(Phase::Loading));
        assert_eq!(seq.phase("b"), Some(Phase::Unloaded));
        assert_eq!(seq.start_load("a").unwrap(), StartOutcome::SessionEnded);
        assert_eq!(seq.trace().issued_count("b"), 0);
    }
}
