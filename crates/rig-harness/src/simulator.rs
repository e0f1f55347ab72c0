//! Seeded simulator for the recording scenario
//!
//! Each run shuffles the order in which the player's loads are started and
//! draws per-call latencies from a seeded RNG, then checks:
//! - No dependent was issued before its prerequisite loaded
//! - No load was issued twice
//! - Every load ended `Loaded`
//! - Each route was hit the expected number of times
//!
//! Runs are independent; a batch of them is driven concurrently.

use crate::config::HarnessConfig;
use crate::scenario::{builtin_fixtures, INITIAL_LOADS, QUERY_ROUTE, RECORDING_ROUTE, SNAPSHOTS_ROUTE};
use crate::session::HarnessSession;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rig_intercept::FixtureStore;
use rig_sequencer::{OrderingViolation, Phase, StartOutcome, TraceEventKind};
use serde::Serialize;

/// Runs driven concurrently per batch
const BATCH: u64 = 16;

/// Calls each route must receive in a clean run
const EXPECTED_CALLS: [(&str, usize); 3] = [(RECORDING_ROUTE, 1), (SNAPSHOTS_ROUTE, 2), (QUERY_ROUTE, 1)];

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of runs
    pub runs: u64,
    /// Upper bound of per-call latency
    pub max_latency_ms: u64,
    /// Stop after the batch containing the first violation
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            runs: 100,
            max_latency_ms: 50,
            stop_on_first_violation: true,
        }
    }
}

impl SimulatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// With number of runs
    #[inline]
    #[must_use]
    pub fn with_runs(mut self, runs: u64) -> Self {
        self.runs = runs;
        self
    }

    /// With latency bound
    #[inline]
    #[must_use]
    pub fn with_max_latency_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = max_latency_ms;
        self
    }

    /// With stop policy
    #[inline]
    #[must_use]
    pub fn with_stop_on_first_violation(mut self, stop: bool) -> Self {
        self.stop_on_first_violation = stop;
        self
    }
}

/// A violation detected during simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Trace broke an ordering constraint
    Ordering {
        /// Run index
        run: u64,
        /// What broke
        violation: OrderingViolation,
    },
    /// A load did not end `Loaded`
    NotLoaded {
        /// Run index
        run: u64,
        /// Load name
        load: String,
        /// Final phase
        phase: Option<Phase>,
    },
    /// A route was hit an unexpected number of times
    CallCount {
        /// Run index
        run: u64,
        /// Route template
        route: String,
        /// Expected calls
        expected: usize,
        /// Observed calls
        actual: usize,
    },
    /// The session could not be mounted
    Setup {
        /// Run index
        run: u64,
        /// Error text
        error: String,
    },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulatorStats {
    /// Runs finished
    pub runs_completed: u64,
    /// Loads issued across runs
    pub loads_issued: u64,
    /// Starts parked on prerequisites
    pub starts_deferred: u64,
    /// Repeated starts that were no-ops
    pub starts_ignored: u64,
    /// Requests intercepted
    pub calls_intercepted: u64,
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    /// Configuration used
    pub config: SimulatorConfig,
    /// Totals
    pub stats: SimulatorStats,
    /// Everything that went wrong
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Rig Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Runs Requested: {}\n", self.config.runs));
        report.push_str(&format!("Runs Completed: {}\n", self.stats.runs_completed));
        report.push_str(&format!("Max Latency: {}ms\n", self.config.max_latency_ms));
        report.push_str(&format!("Loads Issued: {}\n", self.stats.loads_issued));
        report.push_str(&format!("Starts Deferred: {}\n", self.stats.starts_deferred));
        report.push_str(&format!("Starts Ignored: {}\n", self.stats.starts_ignored));
        report.push_str(&format!("Calls Intercepted: {}\n", self.stats.calls_intercepted));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

/// Outcome of one run
#[derive(Debug, Default)]
struct RunOutcome {
    stats: SimulatorStats,
    violations: Vec<Violation>,
}

/// Run the simulator
pub async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    let fixtures = match builtin_fixtures() {
        Ok(fixtures) => fixtures,
        Err(e) => {
            violations.push(Violation::Setup {
                run: 0,
                error: e.to_string(),
            });
            return SimulatorReport {
                config,
                stats,
                violations,
            };
        }
    };

    let mut start = 0;
    while start < config.runs {
        let end = (start + BATCH).min(config.runs);
        let outcomes = join_all((start..end).map(|run| simulate_run(&config, &fixtures, run))).await;

        for outcome in outcomes {
            stats.runs_completed += 1;
            stats.loads_issued += outcome.stats.loads_issued;
            stats.starts_deferred += outcome.stats.starts_deferred;
            stats.starts_ignored += outcome.stats.starts_ignored;
            stats.calls_intercepted += outcome.stats.calls_intercepted;
            violations.extend(outcome.violations);
        }

        if config.stop_on_first_violation && !violations.is_empty() {
            tracing::warn!(runs = stats.runs_completed, "stopping on first violation");
            break;
        }
        start = end;
    }

    tracing::info!(
        runs = stats.runs_completed,
        violations = violations.len(),
        "simulation finished"
    );
    SimulatorReport {
        config,
        stats,
        violations,
    }
}

async fn simulate_run(config: &SimulatorConfig, fixtures: &FixtureStore, run: u64) -> RunOutcome {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(run));
    let mut order = INITIAL_LOADS.to_vec();
    order.shuffle(&mut rng);
    let latency_seed: u64 = rng.random();
    let auto_start = rng.random_bool(0.5);

    let harness_config = HarnessConfig::new()
        .with_latency(0, Some(config.max_latency_ms), Some(latency_seed))
        .with_start_prerequisites(auto_start);

    let mut outcome = RunOutcome::default();
    let session = match HarnessSession::mount_with(harness_config, fixtures, &order) {
        Ok(session) => session,
        Err(e) => {
            outcome.violations.push(Violation::Setup {
                run,
                error: e.to_string(),
            });
            return outcome;
        }
    };
    tracing::debug!(run, ?order, auto_start, "simulation run mounted");

    // A re-render firing every load again must change nothing.
    for load in &order {
        match session.start_load(load) {
            Ok(StartOutcome::AlreadyLoading | StartOutcome::AlreadyPending | StartOutcome::AlreadyLoaded) => {
                outcome.stats.starts_ignored += 1;
            }
            Ok(started) => tracing::trace!(run, load, ?started, "repeat start changed state"),
            Err(e) => outcome.violations.push(Violation::Setup {
                run,
                error: e.to_string(),
            }),
        }
    }
    session.settle().await;

    let sequencer = session.sequencer();
    for event in sequencer.trace().events() {
        match event.kind {
            TraceEventKind::Issued => outcome.stats.loads_issued += 1,
            TraceEventKind::Deferred { .. } => outcome.stats.starts_deferred += 1,
            _ => {}
        }
    }
    outcome.stats.calls_intercepted = session.interceptor().call_count() as u64;

    outcome.violations.extend(
        sequencer
            .trace()
            .check_ordering(sequencer.graph())
            .into_iter()
            .map(|violation| Violation::Ordering { run, violation }),
    );
    for load in INITIAL_LOADS {
        let phase = sequencer.phase(load);
        if phase != Some(Phase::Loaded) {
            outcome.violations.push(Violation::NotLoaded {
                run,
                load: load.to_string(),
                phase,
            });
        }
    }
    for (route, expected) in EXPECTED_CALLS {
        let actual = session.interceptor().calls_to(route).len();
        if actual != expected {
            outcome.violations.push(Violation::CallCount {
                run,
                route: route.to_string(),
                expected,
                actual,
            });
        }
    }

    session.unmount();
    outcome
}
