//! Harness session: one mounted preview of the recording player
//!
//! Mounting builds the interceptor and sequencer and fires the player's
//! initial loads the way the component would on mount: all of them at once,
//! in whatever order, leaving the dependency graph to order the requests.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::scenario::{builtin_fixtures, recording_loads, recording_routes, INITIAL_LOADS};
use crate::view::{LoadView, RenderProps, RenderView};
use rig_intercept::{FixtureStore, Interceptor, InterceptorConfig, RecordedCall};
use rig_sequencer::{
    OrderingViolation, Phase, Sequencer, SequencerBuilder, SequencerConfig, SequencerError,
    TraceEvent,
};
use serde::Serialize;
use std::sync::Arc;

/// A mounted harness session
///
/// Dropping it ends the sequencer session, as [`HarnessSession::unmount`] does.
#[derive(Debug)]
pub struct HarnessSession {
    config: HarnessConfig,
    props: RenderProps,
    interceptor: Arc<Interceptor>,
    sequencer: Sequencer,
}

impl HarnessSession {
    /// Mount with fixtures from the config
    ///
    /// Built-in fixtures are used, overlaid with `fixtures_dir` when set.
    ///
    /// # Errors
    /// Any setup error; see [`Self::mount_with`]
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn mount(config: HarnessConfig) -> Result<Self, HarnessError> {
        let mut fixtures = builtin_fixtures()?;
        if let Some(dir) = &config.fixtures_dir {
            fixtures.merge(FixtureStore::load_dir(dir)?);
        }
        Self::mount_with(config, &fixtures, &INITIAL_LOADS)
    }

    /// Mount with explicit fixtures and start order
    ///
    /// # Errors
    /// Any setup error. Unknown names in `start_order` are rejected before
    /// anything is issued; if a start fails later, the session is ended.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn mount_with(
        config: HarnessConfig,
        fixtures: &FixtureStore,
        start_order: &[&str],
    ) -> Result<Self, HarnessError> {
        config.validate()?;
        let props = config.render_props();

        let table = recording_routes(fixtures)?;
        let interceptor = Arc::new(Interceptor::new(
            table,
            InterceptorConfig::new().with_latency(config.latency_model()),
        ));

        let mut builder = SequencerBuilder::new(Arc::clone(&interceptor) as _).with_config(
            SequencerConfig::new().with_start_prerequisites(config.start_prerequisites),
        );
        recording_loads(&mut builder, config.team_id, &props)?;
        let sequencer = builder.build();

        if let Some(unknown) = start_order.iter().find(|load| !sequencer.graph().contains(load)) {
            return Err(SequencerError::UnknownLoad((*unknown).into()).into());
        }

        tracing::info!(
            session_id = %props.session_id,
            session_key = %props.session_key,
            latency = ?config.latency_model(),
            "mounting harness session"
        );
        // Built first so a failed start is torn down by `Drop`.
        let session = Self {
            config,
            props,
            interceptor,
            sequencer,
        };
        for load in start_order {
            session.sequencer.start_load(load)?;
        }
        Ok(session)
    }

    /// Wait until no load can make progress
    pub async fn settle(&self) {
        self.sequencer.settled().await;
    }

    /// Current view of every load
    #[must_use]
    pub fn view(&self) -> RenderView {
        let loads = self
            .sequencer
            .graph()
            .keys()
            .filter_map(|key| {
                let state = self.sequencer.state(key.as_str())?;
                Some((key.to_string(), LoadView::from(&state)))
            })
            .collect();
        RenderView {
            props: self.props.clone(),
            loads,
        }
    }

    /// End the session; late results are discarded
    pub fn unmount(&self) {
        tracing::info!(session_id = %self.props.session_id, "unmounting harness session");
        self.sequencer.end_session();
    }

    /// Check if still mounted
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.sequencer.is_live()
    }

    /// Fire an extra load, as a re-render would
    ///
    /// # Errors
    /// `HarnessError::Unmounted` after [`Self::unmount`], or
    /// `HarnessError::Sequencer` for an unknown load
    pub fn start_load(&self, load: &str) -> Result<rig_sequencer::StartOutcome, HarnessError> {
        if !self.is_mounted() {
            return Err(HarnessError::Unmounted);
        }
        Ok(self.sequencer.start_load(load)?)
    }

    /// Summary of what happened so far
    #[must_use]
    pub fn report(&self) -> SessionReport {
        let failures = self.sequencer.failures();
        for failure in &failures {
            tracing::error!(load = %failure.key, error = %failure.reason, "load did not complete");
        }
        SessionReport {
            props: self.props.clone(),
            view: self.view(),
            calls: self.interceptor.calls(),
            trace: self.sequencer.trace().events(),
            violations: self.sequencer.trace().check_ordering(self.sequencer.graph()),
            failures: failures.iter().map(ToString::to_string).collect(),
        }
    }

    /// Settle, then fail if any load did not complete
    ///
    /// # Errors
    /// `HarnessError::LoadsFailed` with every failure, blocked loads included
    pub async fn settle_checked(&self) -> Result<RenderView, HarnessError> {
        self.settle().await;
        let failures = self.sequencer.failures();
        if failures.is_empty() {
            Ok(self.view())
        } else {
            Err(HarnessError::LoadsFailed(failures))
        }
    }

    /// Props handed to the component
    #[must_use]
    pub fn props(&self) -> &RenderProps {
        &self.props
    }

    /// Configuration mounted with
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Interceptor and its call log
    #[must_use]
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// Sequencer
    #[must_use]
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }
}

impl Drop for HarnessSession {
    fn drop(&mut self) {
        self.sequencer.end_session();
    }
}

/// What a session did
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Props rendered with
    pub props: RenderProps,
    /// Final view
    pub view: RenderView,
    /// Intercepted calls in order
    pub calls: Vec<RecordedCall>,
    /// Sequencer trace
    pub trace: Vec<TraceEvent>,
    /// Ordering violations found in the trace
    pub violations: Vec<OrderingViolation>,
    /// Failed or blocked loads
    pub failures: Vec<String>,
}

impl SessionReport {
    /// Check if every load loaded in a valid order
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty() && self.failures.is_empty() && self.view.is_complete()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Harness Session Report ===\n\n");
        report.push_str(&format!("Session: {} ({})\n", self.props.session_id, self.props.session_key));

        report.push_str("\n--- Loads ---\n");
        for (name, load) in &self.view.loads {
            let detail = match load.phase {
                Phase::Failed => load.error.clone().unwrap_or_default(),
                Phase::Loaded if self.view.line_count(name) > 0 => {
                    format!("{} lines", self.view.line_count(name))
                }
                Phase::Loaded if self.view.result_count(name) > 0 => {
                    format!("{} results", self.view.result_count(name))
                }
                _ => String::new(),
            };
            report.push_str(&format!("{name:<18} {:<9} {detail}\n", format!("{:?}", load.phase)));
        }

        report.push_str("\n--- Calls ---\n");
        for call in &self.calls {
            let outcome = match (&call.status, &call.error) {
                (Some(status), _) => format!("{status} via {}", call.branch.as_deref().unwrap_or("-")),
                (None, Some(error)) => format!("ERROR {error}"),
                (None, None) => "-".to_string(),
            };
            report.push_str(&format!("#{:<3} {:<5} {} -> {outcome}\n", call.seq, call.method.as_str(), call.path));
        }

        if !self.violations.is_empty() {
            report.push_str("\n--- Ordering Violations ---\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {v}\n", i + 1));
            }
        }
        if !self.failures.is_empty() {
            report.push_str("\n--- Failures ---\n");
            for (i, f) in self.failures.iter().enumerate() {
                report.push_str(&format!("{}. {f}\n", i + 1));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}
