//! The session-recording preview scenario
//!
//! Three backend routes answer from four fixture datasets, and four loads
//! fetch them. `snapshots` needs the blob key from `snapshot_sources`, and
//! `events` needs the time range from `metadata`.

use crate::error::HarnessError;
use crate::view::RenderProps;
use rig_intercept::{
    BodyPredicate, Branches, FixtureError, FixtureStore, Handler, Method, QueryPredicate,
    RawRequest, Response, RouteTable, NDJSON_CONTENT_TYPE,
};
use rig_sequencer::{LoadContext, RequestOperation, SequencerBuilder, SequencerError};
use serde_json::{json, Value};
use url::form_urlencoded;

/// Recording metadata load
pub const METADATA: &str = "metadata";
/// Snapshot source list load
pub const SNAPSHOT_SOURCES: &str = "snapshot_sources";
/// Snapshot blob load
pub const SNAPSHOTS: &str = "snapshots";
/// Recording events load
pub const EVENTS: &str = "events";

/// Loads the player starts on mount
pub const INITIAL_LOADS: [&str; 4] = [METADATA, SNAPSHOT_SOURCES, SNAPSHOTS, EVENTS];

/// Recording metadata route
pub const RECORDING_ROUTE: &str = "/api/projects/:team_id/session_recordings/:id";
/// Snapshot route; `source` selects list or blob
pub const SNAPSHOTS_ROUTE: &str = "/api/projects/:team_id/session_recordings/:id/snapshots";
/// Query route
pub const QUERY_ROUTE: &str = "/api/projects/:team_id/query";

/// Fixture dataset names
pub mod datasets {
    /// Recording metadata record
    pub const META: &str = "recording_meta";
    /// Snapshot source list
    pub const SOURCES: &str = "snapshot_sources";
    /// Line-delimited snapshot stream
    pub const SNAPSHOTS: &str = "recording_snapshots";
    /// Events query result
    pub const EVENTS: &str = "recording_events";
}

const BUILTIN_META: &str = include_str!("../fixtures/recording_meta.json");
const BUILTIN_SOURCES: &str = include_str!("../fixtures/snapshot_sources.json");
const BUILTIN_SNAPSHOTS: &str = include_str!("../fixtures/recording_snapshots.jsonl");
const BUILTIN_EVENTS: &str = include_str!("../fixtures/recording_events.json");

const EVENT_COLUMNS: [&str; 7] = [
    "uuid",
    "event",
    "timestamp",
    "elements_chain",
    "properties.$window_id",
    "properties.$current_url",
    "properties.$event_type",
];

/// Fixtures compiled into the binary
///
/// # Errors
/// `FixtureError::Json` if a built-in dataset does not parse
pub fn builtin_fixtures() -> Result<FixtureStore, FixtureError> {
    let parse = |name: &str, text: &str| {
        serde_json::from_str::<Value>(text).map_err(|source| FixtureError::Json {
            path: format!("builtin:{name}"),
            source,
        })
    };

    let mut store = FixtureStore::new();
    store.insert_json(datasets::META, parse(datasets::META, BUILTIN_META)?);
    store.insert_json(datasets::SOURCES, parse(datasets::SOURCES, BUILTIN_SOURCES)?);
    store.insert_text(datasets::SNAPSHOTS, BUILTIN_SNAPSHOTS, NDJSON_CONTENT_TYPE);
    store.insert_json(datasets::EVENTS, parse(datasets::EVENTS, BUILTIN_EVENTS)?);
    Ok(store)
}

/// Route table answering the scenario's requests from `fixtures`
///
/// # Errors
/// - `HarnessError::Fixture` if a dataset is missing
/// - `HarnessError::Configuration` if the routes overlap
pub fn recording_routes(fixtures: &FixtureStore) -> Result<RouteTable, HarnessError> {
    let dataset = |name: &str| -> Result<Response, FixtureError> {
        Ok(Response::from_payload(fixtures.require(name)?.clone()))
    };

    let mut builder = RouteTable::builder();
    builder.route(Method::Get, RECORDING_ROUTE, Handler::literal(dataset(datasets::META)?))?;

    // Anything but a blob request gets the source list.
    builder.route(
        Method::Get,
        SNAPSHOTS_ROUTE,
        Branches::new()
            .when("sources", QueryPredicate::absent("source"), dataset(datasets::SOURCES)?)
            .when(
                "blob",
                QueryPredicate::equals("source", "blob"),
                dataset(datasets::SNAPSHOTS)?,
            )
            .otherwise(dataset(datasets::SOURCES)?),
    )?;

    builder.route(
        Method::Post,
        QUERY_ROUTE,
        Branches::new()
            .when(
                "session-events",
                BodyPredicate::All(vec![
                    BodyPredicate::equals("/query/kind", "EventsQuery"),
                    BodyPredicate::array_len("/query/properties", 1),
                ]),
                dataset(datasets::EVENTS)?,
            )
            .otherwise(Response::empty_results()),
    )?;

    Ok(builder.build())
}

/// One line per route: method, template, handler kind and branch names
#[must_use]
pub fn describe_routes(table: &RouteTable) -> Vec<String> {
    table
        .routes()
        .iter()
        .map(|route| {
            let (names, default) = match &route.handler {
                Handler::QueryBranches(b) => (
                    b.branches().iter().map(|b| b.name.clone()).collect::<Vec<_>>(),
                    b.default_response().is_some(),
                ),
                Handler::BodyBranches(b) => (
                    b.branches().iter().map(|b| b.name.clone()).collect(),
                    b.default_response().is_some(),
                ),
                Handler::Literal(_) | Handler::Computed(_) => (Vec::new(), false),
            };
            let mut line = format!(
                "{:<5} {} [{}]",
                route.spec.method.as_str(),
                route.spec.template,
                route.handler.kind()
            );
            if !names.is_empty() {
                line.push_str(&format!(" {}", names.join(" | ")));
                if default {
                    line.push_str(" | default");
                }
            }
            line
        })
        .collect()
}

/// Declare the scenario's loads and their dependencies
///
/// # Errors
/// `SequencerError` if a load or dependency is declared twice
pub fn recording_loads(
    builder: &mut SequencerBuilder,
    team_id: u64,
    props: &RenderProps,
) -> Result<(), SequencerError> {
    let recording = format!("/api/projects/{team_id}/session_recordings/{}", props.session_id);
    let snapshots = format!("{recording}/snapshots");
    let query = format!("/api/projects/{team_id}/query");

    builder.add_load(METADATA, RequestOperation::get(recording))?;
    builder.add_load(SNAPSHOT_SOURCES, RequestOperation::get(snapshots.clone()))?;

    builder.add_load(
        SNAPSHOTS,
        RequestOperation::new(move |ctx| {
            let key = blob_key(ctx)?;
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("source", "blob")
                .append_pair("blob_key", &key)
                .finish();
            Ok(RawRequest::get(format!("{snapshots}?{query}")))
        }),
    )?;
    builder.add_dependency(SNAPSHOTS, SNAPSHOT_SOURCES)?;

    let session_id = props.session_id.clone();
    builder.add_load(
        EVENTS,
        RequestOperation::new(move |ctx| {
            let body = events_query(ctx, &session_id)?;
            Ok(RawRequest::post_json(query.clone(), &body))
        }),
    )?;
    builder.add_dependency(EVENTS, METADATA)?;

    Ok(())
}

fn blob_key(ctx: &LoadContext) -> Result<String, String> {
    let sources = ctx
        .prerequisite_json(SNAPSHOT_SOURCES)
        .and_then(|v| v["sources"].as_array())
        .ok_or("snapshot sources have no `sources` list")?;
    sources
        .iter()
        .find(|s| s["source"] == "blob")
        .and_then(|s| s["blob_key"].as_str())
        .map(str::to_string)
        .ok_or_else(|| "no blob source in snapshot sources".to_string())
}

fn events_query(ctx: &LoadContext, session_id: &str) -> Result<Value, String> {
    let meta = ctx
        .prerequisite_json(METADATA)
        .ok_or("metadata is not JSON")?;
    let time = |field: &str| {
        meta[field]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("metadata has no `{field}`"))
    };

    Ok(json!({
        "query": {
            "kind": "EventsQuery",
            "select": EVENT_COLUMNS,
            "orderBy": ["timestamp ASC"],
            "limit": 1_000_000,
            "after": time("start_time")?,
            "before": time("end_time")?,
            "properties": [{
                "key": "$session_id",
                "value": [session_id],
                "operator": "exact",
                "type": "event"
            }]
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_fixtures_parse() {
        let store = builtin_fixtures().unwrap();
        assert_eq!(store.len(), 4);
        let sources = store.require(datasets::SOURCES).unwrap().as_json().unwrap();
        assert_eq!(sources["sources"][0]["blob_key"], "1691755416097-1691755492268");
        assert_eq!(
            store.require(datasets::SNAPSHOTS).unwrap().content_type(),
            NDJSON_CONTENT_TYPE
        );
    }

    #[test]
    fn routes_need_every_dataset() {
        let mut store = FixtureStore::new();
        store.insert_json(datasets::META, json!({}));
        assert!(matches!(
            recording_routes(&store),
            Err(HarnessError::Fixture(FixtureError::Missing(_)))
        ));
    }

    #[test]
    fn describes_routes() {
        let table = recording_routes(&builtin_fixtures().unwrap()).unwrap();
        assert_eq!(
            describe_routes(&table),
            vec![
                "GET   /api/projects/:team_id/session_recordings/:id [literal]".to_string(),
                "GET   /api/projects/:team_id/session_recordings/:id/snapshots [query-branches] sources | blob | default".to_string(),
                "POST  /api/projects/:team_id/query [body-branches] session-events | default".to_string(),
            ]
        );
    }
}
