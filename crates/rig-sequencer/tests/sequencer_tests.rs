//! Sequencer against a real interceptor: ordering, idempotence, failure
//! propagation and session teardown.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rig_intercept::prelude::*;
use rig_sequencer::prelude::*;
use rig_sequencer::{FailureReason, TraceEventKind};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn interceptor(latency: LatencyModel, metadata_status: u16) -> Arc<Interceptor> {
    let mut builder = RouteTable::builder();
    builder
        .route(
            Method::Get,
            "/api/recording/:id",
            Handler::literal(
                Response::json(json!({"id": "r1", "start_time": "2023-08-11T12:03:36Z"}))
                    .with_status(metadata_status),
            ),
        )
        .unwrap();
    builder
        .route(
            Method::Post,
            "/api/query",
            Branches::new()
                .when(
                    "events",
                    BodyPredicate::equals("/after", "2023-08-11T12:03:36Z"),
                    Response::json(json!({"results": [["e1", "$pageview"]]})),
                )
                .otherwise(Response::empty_results()),
        )
        .unwrap();
    Arc::new(Interceptor::new(
        builder.build(),
        InterceptorConfig::new().with_latency(latency),
    ))
}

fn sequencer(transport: Arc<Interceptor>) -> Sequencer {
    let mut builder = SequencerBuilder::new(transport);
    builder
        .add_load("metadata", RequestOperation::get("/api/recording/r1"))
        .unwrap();
    builder
        .add_load(
            "events",
            RequestOperation::new(|ctx| {
                let start = ctx
                    .prerequisite_json("metadata")
                    .and_then(|m| m["start_time"].as_str())
                    .ok_or("metadata has no start_time")?;
                Ok(RawRequest::post_json("/api/query", &json!({"after": start})))
            }),
        )
        .unwrap();
    builder.add_dependency("events", "metadata").unwrap();
    builder.build()
}

#[tokio::test(start_paused = true)]
async fn dependent_issued_once_after_prerequisite_loads() {
    let transport = interceptor(LatencyModel::Fixed(Duration::from_millis(50)), 200);
    let seq = sequencer(Arc::clone(&transport));

    assert_eq!(seq.start_load("metadata").unwrap(), StartOutcome::Issued);
    assert_eq!(
        seq.start_load("events").unwrap(),
        StartOutcome::Deferred {
            waiting_on: vec!["metadata".into()]
        }
    );

    // Metadata is in flight; the query route must not have been hit.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(seq.phase("metadata"), Some(Phase::Loading));
    assert!(transport.calls_to("/api/query").is_empty());

    // Repeated starts while waiting change nothing.
    for _ in 0..5 {
        assert_eq!(seq.start_load("events").unwrap(), StartOutcome::AlreadyPending);
        assert_eq!(seq.start_load("metadata").unwrap(), StartOutcome::AlreadyLoading);
    }

    seq.settled().await;

    assert_eq!(seq.phase("events"), Some(Phase::Loaded));
    let calls = transport.calls_to("/api/query");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].branch.as_deref(), Some("events"));
    assert_eq!(transport.calls_to("/api/recording/:id").len(), 1);
    assert!(seq.trace().check_ordering(seq.graph()).is_empty());

    let value = seq.state("events").unwrap();
    assert_eq!(
        value.value().and_then(|p| p.as_json()).map(|v| v["results"][0][1].clone()),
        Some(json!("$pageview"))
    );
}

#[tokio::test(start_paused = true)]
async fn unrelated_changes_do_not_trigger_dependent() {
    let transport = interceptor(LatencyModel::Fixed(Duration::from_millis(20)), 200);
    let mut builder = SequencerBuilder::new(transport.clone());
    builder
        .add_load("metadata", RequestOperation::get("/api/recording/r1"))
        .unwrap();
    builder
        .add_load("other", RequestOperation::get("/api/recording/r2"))
        .unwrap();
    builder
        .add_load(
            "events",
            RequestOperation::fixed(RawRequest::post_json("/api/query", &json!({}))),
        )
        .unwrap();
    builder.add_dependency("events", "metadata").unwrap();
    let seq = builder.build();

    seq.start_load("events").unwrap();
    seq.start_load("other").unwrap();
    seq.settled().await;

    assert_eq!(seq.phase("other"), Some(Phase::Loaded));
    assert_eq!(seq.phase("events"), Some(Phase::Unloaded));
    assert!(transport.calls_to("/api/query").is_empty());

    seq.start_load("metadata").unwrap();
    seq.settled().await;
    assert_eq!(transport.calls_to("/api/query").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_prerequisite_blocks_dependent() {
    let transport = interceptor(LatencyModel::Fixed(Duration::from_millis(5)), 500);
    let seq = sequencer(Arc::clone(&transport));

    seq.start_load("metadata").unwrap();
    seq.start_load("events").unwrap();
    seq.settled().await;

    assert_eq!(seq.phase("metadata"), Some(Phase::Failed));
    assert_eq!(seq.phase("events"), Some(Phase::Unloaded));
    assert!(transport.calls_to("/api/query").is_empty());

    let failures = seq.failures();
    assert_eq!(failures[0].reason, FailureReason::Status(500));
    assert_eq!(
        failures[1].reason,
        FailureReason::Prerequisite("metadata".into())
    );

    let kinds: Vec<_> = seq
        .trace()
        .events_for("events")
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds.last(),
        Some(&TraceEventKind::Blocked {
            by: "metadata".into()
        })
    );
}

/// `c` needs `b` needs `a`; `a` answers 500.
fn failing_chain(transport: Arc<Interceptor>) -> Sequencer {
    let mut builder = SequencerBuilder::new(transport);
    builder.add_load("a", RequestOperation::get("/api/recording/a")).unwrap();
    builder.add_load("b", RequestOperation::get("/api/recording/b")).unwrap();
    builder
        .add_load("c", RequestOperation::fixed(RawRequest::post_json("/api/query", &json!({}))))
        .unwrap();
    builder.add_dependency("b", "a").unwrap();
    builder.add_dependency("c", "b").unwrap();
    builder.build()
}

fn was_blocked(seq: &Sequencer, load: &str, by: &str) -> bool {
    seq.trace()
        .events()
        .iter()
        .any(|e| e.key.as_str() == load && e.kind == TraceEventKind::Blocked { by: by.into() })
}

fn assert_chain_blocked(seq: &Sequencer, transport: &Interceptor) {
    assert_eq!(seq.phase("a"), Some(Phase::Failed));
    assert_eq!(seq.phase("b"), Some(Phase::Unloaded));
    assert_eq!(seq.phase("c"), Some(Phase::Unloaded));
    assert!(was_blocked(seq, "b", "a"));
    assert!(was_blocked(seq, "c", "b"));
    assert!(seq.pending().is_empty());

    assert_eq!(transport.call_count(), 1);
    assert_eq!(seq.trace().issued_count("b"), 0);
    assert_eq!(seq.trace().issued_count("c"), 0);

    let failures: Vec<_> = seq
        .failures()
        .into_iter()
        .map(|f| (f.key.to_string(), f.reason))
        .collect();
    assert_eq!(
        failures,
        vec![
            ("a".to_string(), FailureReason::Status(500)),
            ("b".to_string(), FailureReason::Prerequisite("a".into())),
            ("c".to_string(), FailureReason::Prerequisite("b".into())),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failure_blocks_whole_parked_chain() {
    let transport = interceptor(LatencyModel::Fixed(Duration::from_millis(5)), 500);
    let seq = failing_chain(Arc::clone(&transport));

    seq.start_load("c").unwrap();
    seq.start_load("b").unwrap();
    assert_eq!(seq.start_load("a").unwrap(), StartOutcome::Issued);
    seq.settled().await;

    assert_chain_blocked(&seq, &transport);
    assert_eq!(seq.start_load("c").unwrap(), StartOutcome::Blocked { by: "b".into() });
}

#[tokio::test(start_paused = true)]
async fn late_start_blocks_parked_dependents() {
    let transport = interceptor(LatencyModel::Fixed(Duration::from_millis(5)), 500);
    let seq = failing_chain(Arc::clone(&transport));

    seq.start_load("c").unwrap();
    seq.start_load("a").unwrap();
    seq.settled().await;
    // `b` was never started, so `c` is still parked behind it.
    assert_eq!(seq.pending(), vec![LoadKey::from("c")]);

    assert_eq!(seq.start_load("b").unwrap(), StartOutcome::Blocked { by: "a".into() });
    assert_chain_blocked(&seq, &transport);
}

#[tokio::test(start_paused = true)]
async fn missing_fixture_surfaces_as_failure() {
    let transport = interceptor(LatencyModel::None, 200);
    let mut builder = SequencerBuilder::new(transport);
    builder
        .add_load("snapshots", RequestOperation::get("/api/unknown/1"))
        .unwrap();
    let seq = builder.build();

    seq.start_load("snapshots").unwrap();
    seq.settled().await;

    let state = seq.state("snapshots").unwrap();
    let failure = state.failure().unwrap();
    assert!(failure.is_fixture_gap());
}

#[tokio::test(start_paused = true)]
async fn ended_session_leaves_state_untouched() {
    let transport = interceptor(LatencyModel::Fixed(Duration::from_millis(100)), 200);
    let seq = sequencer(Arc::clone(&transport));
    let mut rx = seq.subscribe("metadata").unwrap();

    seq.start_load("metadata").unwrap();
    seq.start_load("events").unwrap();
    rx.borrow_and_update();
    seq.end_session();
    seq.settled().await;

    assert!(!rx.has_changed().unwrap());
    assert_eq!(seq.phase("metadata"), Some(Phase::Loading));
    assert_eq!(seq.phase("events"), Some(Phase::Unloaded));
    assert!(transport.calls_to("/api/query").is_empty());
    assert_eq!(seq.start_load("events").unwrap(), StartOutcome::SessionEnded);
    assert!(seq
        .trace()
        .events_for("metadata")
        .iter()
        .any(|e| e.kind == TraceEventKind::Discarded));
}

fn run_seeded(seed: u64, start_events_first: bool) -> (usize, usize) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();
    rt.block_on(async move {
        let transport = interceptor(
            LatencyModel::Seeded {
                seed,
                min: Duration::from_millis(1),
                max: Duration::from_millis(200),
            },
            200,
        );
        let seq = sequencer(Arc::clone(&transport));
        if start_events_first {
            seq.start_load("events").unwrap();
            seq.start_load("metadata").unwrap();
        } else {
            seq.start_load("metadata").unwrap();
            seq.start_load("events").unwrap();
        }
        seq.settled().await;
        (
            seq.trace().check_ordering(seq.graph()).len(),
            transport.calls_to("/api/query").len(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_dependent_never_precedes_prerequisite(seed in any::<u64>(), events_first in any::<bool>()) {
        let (violations, query_calls) = run_seeded(seed, events_first);
        prop_assert_eq!(violations, 0);
        prop_assert_eq!(query_calls, 1);
    }
}
