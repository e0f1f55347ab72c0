//! Testing utilities for the rig workspace
//!
//! Shared fixtures, request builders and assertions.

#![allow(missing_docs)]

use rig_harness::scenario::{builtin_fixtures, recording_routes};
use rig_harness::{HarnessConfig, RenderProps, DEFAULT_SESSION_ID};
use rig_intercept::{Interceptor, InterceptorConfig, LatencyModel, RawRequest};
use rig_sequencer::{Trace, TraceEventKind};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const TEAM_ID: u64 = 2;

pub fn recording_props() -> RenderProps {
    RenderProps::new(DEFAULT_SESSION_ID, "recording-preview")
}

/// Config with a fixed per-call latency
pub fn config_with_latency(latency_ms: u64) -> HarnessConfig {
    HarnessConfig::new().with_latency(latency_ms, None, None)
}

/// Interceptor over the built-in recording routes
pub fn recording_interceptor(latency: LatencyModel) -> Arc<Interceptor> {
    let fixtures = builtin_fixtures().unwrap();
    let table = recording_routes(&fixtures).unwrap();
    Arc::new(Interceptor::new(
        table,
        InterceptorConfig::new().with_latency(latency),
    ))
}

pub fn fixed_latency(ms: u64) -> LatencyModel {
    LatencyModel::Fixed(Duration::from_millis(ms))
}

pub fn recording_url(session_id: &str) -> String {
    format!("/api/projects/{TEAM_ID}/session_recordings/{session_id}")
}

pub fn snapshots_url(session_id: &str, source: Option<&str>) -> String {
    match source {
        Some(source) => format!("{}/snapshots?source={source}", recording_url(session_id)),
        None => format!("{}/snapshots", recording_url(session_id)),
    }
}

/// `EventsQuery` body with `properties` filter clauses
pub fn events_query_body(properties: usize) -> Value {
    let clauses: Vec<Value> = (0..properties)
        .map(|i| json!({"key": format!("prop{i}"), "value": ["x"], "operator": "exact", "type": "event"}))
        .collect();
    json!({"query": {"kind": "EventsQuery", "properties": clauses}})
}

pub fn query_request(body: &Value) -> RawRequest {
    RawRequest::post_json(format!("/api/projects/{TEAM_ID}/query"), body)
}

/// Position of the first event of `kind` for `load`
pub fn position(trace: &Trace, load: &str, kind: &TraceEventKind) -> Option<u64> {
    trace
        .events()
        .into_iter()
        .find(|e| e.key.as_str() == load && &e.kind == kind)
        .map(|e| e.seq)
}

/// Assert `load` was issued exactly once, after `prerequisite` loaded
pub fn assert_issued_after(trace: &Trace, load: &str, prerequisite: &str) {
    assert_eq!(trace.issued_count(load), 1, "{load} should be issued exactly once");
    let loaded = position(
        trace,
        prerequisite,
        &TraceEventKind::Settled {
            phase: rig_sequencer::Phase::Loaded,
        },
    )
    .unwrap_or_else(|| panic!("{prerequisite} never loaded"));
    let issued = position(trace, load, &TraceEventKind::Issued).unwrap_or_else(|| panic!("{load} never issued"));
    assert!(
        loaded < issued,
        "{load} issued at #{issued} before {prerequisite} loaded at #{loaded}"
    );
}
