//! End-to-end interception: raw request in, response or loud failure out.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rig_intercept::prelude::*;
use rig_intercept::{ConfigurationError, ResolveError, NDJSON_CONTENT_TYPE};
use serde_json::json;

const SNAPSHOT_LINES: &str = "{\"window_id\":\"w1\",\"data\":[{\"type\":4}]}\n{\"window_id\":\"w1\",\"data\":[{\"type\":2}]}\n";

fn sources() -> serde_json::Value {
    json!({
        "sources": [{
            "source": "blob",
            "start_timestamp": "2023-08-11T12:03:36.097000Z",
            "end_timestamp": "2023-08-11T12:04:52.268000Z",
            "blob_key": "1691755416097-1691755492268"
        }]
    })
}

fn events() -> serde_json::Value {
    json!({"columns": ["uuid", "event"], "results": [["e1", "$pageview"]]})
}

fn table() -> RouteTable {
    let mut builder = RouteTable::builder();
    builder
        .route(
            Method::Get,
            "/resource/:id",
            Branches::new()
                .when("sources", QueryPredicate::absent("source"), Response::json(sources()))
                .when(
                    "blob",
                    QueryPredicate::equals("source", "blob"),
                    Response::text(SNAPSHOT_LINES, NDJSON_CONTENT_TYPE),
                )
                .otherwise(Response::json(sources())),
        )
        .unwrap();
    builder
        .route(
            Method::Post,
            "/query",
            Branches::new()
                .when(
                    "events",
                    BodyPredicate::All(vec![
                        BodyPredicate::equals("/query/kind", "EventsQuery"),
                        BodyPredicate::array_len("/query/properties", 1),
                    ]),
                    Response::json(events()),
                )
                .otherwise(Response::empty_results()),
        )
        .unwrap();
    builder.build()
}

fn interceptor() -> Interceptor {
    Interceptor::new(table(), InterceptorConfig::new())
}

#[tokio::test]
async fn source_absent_returns_source_list() {
    let response = interceptor()
        .dispatch(RawRequest::get("/resource/abc"))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.payload, Payload::Json(sources()));
}

#[tokio::test]
async fn source_blob_returns_literal_text() {
    let response = interceptor()
        .dispatch(RawRequest::get("/resource/abc?source=blob"))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), NDJSON_CONTENT_TYPE);
    assert_eq!(response.payload.as_text(), Some(SNAPSHOT_LINES));
}

#[tokio::test]
async fn events_query_with_one_filter_returns_events() {
    let body = json!({"query": {"kind": "EventsQuery", "properties": [{"key": "$session_id", "value": "abc"}]}});
    let response = interceptor()
        .dispatch(RawRequest::post_json("/query", &body))
        .await
        .unwrap();
    assert_eq!(response.payload, Payload::Json(events()));
}

#[tokio::test]
async fn events_query_without_filters_returns_empty_results() {
    let body = json!({"query": {"kind": "EventsQuery", "properties": []}});
    let response = interceptor()
        .dispatch(RawRequest::post_json("/query", &body))
        .await
        .unwrap();
    assert_eq!(response.payload, Payload::Json(json!({"results": []})));
}

#[tokio::test]
async fn other_query_kinds_return_empty_results() {
    let body = json!({"query": {"kind": "HogQLQuery", "query": "select 1"}});
    let response = interceptor()
        .dispatch(RawRequest::post_json("/query", &body))
        .await
        .unwrap();
    assert_eq!(response, Response::empty_results());
}

#[tokio::test]
async fn unmatched_route_is_a_loud_failure() {
    let err = interceptor()
        .dispatch(RawRequest::get("/resource/abc/comments"))
        .await
        .unwrap_err();
    assert!(err.is_fixture_gap());
    assert_eq!(
        err,
        InterceptError::NoMatch {
            method: Method::Get,
            path: "/resource/abc/comments".to_string(),
        }
    );
}

#[tokio::test]
async fn unknown_source_gets_declared_default() {
    let interceptor = interceptor();
    let response = interceptor
        .dispatch(RawRequest::get("/resource/abc?source=realtime"))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.payload, Payload::Json(sources()));
    assert_eq!(interceptor.calls()[0].branch.as_deref(), Some("default"));
}

#[tokio::test]
async fn branches_without_default_leave_a_gap() {
    let mut builder = RouteTable::builder();
    builder
        .route(
            Method::Get,
            "/resource/:id",
            Branches::new().when("blob", QueryPredicate::equals("source", "blob"), Response::json(json!({}))),
        )
        .unwrap();
    let err = Interceptor::new(builder.build(), InterceptorConfig::new())
        .dispatch(RawRequest::get("/resource/abc?source=realtime"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InterceptError::Resolution(ResolveError::ResolutionGap { branches_tried: 1, .. })
    ));
    assert!(err.is_fixture_gap());
}

fn template_segment() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("a"), Just("b"), Just(":x")]
}

proptest! {
    /// A table that builds never has two routes of one method answering the
    /// same concrete path.
    #[test]
    fn prop_built_tables_are_unambiguous(
        templates in proptest::collection::vec(proptest::collection::vec(template_segment(), 1..4), 1..8),
        path in proptest::collection::vec(prop_oneof![Just("a"), Just("b"), Just("c")], 1..4),
    ) {
        let mut builder = RouteTable::builder();
        for (i, segments) in templates.iter().enumerate() {
            let segments: Vec<String> = segments
                .iter()
                .enumerate()
                .map(|(j, s)| if *s == ":x" { format!(":x{j}") } else { (*s).to_string() })
                .collect();
            let template = format!("/{}", segments.join("/"));
            match builder.route(Method::Get, &template, Response::json(json!(i))) {
                Ok(_)
                | Err(ConfigurationError::AmbiguousRoute { .. })
                | Err(ConfigurationError::DuplicateRoute { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
        let table = builder.build();
        let path = format!("/{}", path.join("/"));
        let matching = table
            .routes()
            .iter()
            .filter(|r| r.spec.template.matches(&path).is_some())
            .count();
        prop_assert!(matching <= 1);
    }
}
