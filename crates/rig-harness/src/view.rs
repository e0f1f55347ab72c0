//! What the previewed component is handed and what it would read

use rig_intercept::Payload;
use rig_sequencer::{LoadState, Phase};
use serde::Serialize;
use std::collections::BTreeMap;

/// Props bundle handed to the rendering façade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderProps {
    /// Recording to show
    pub session_id: String,
    /// Key scoping the player's state
    pub session_key: String,
}

impl RenderProps {
    /// Create props
    #[must_use]
    pub fn new(session_id: &str, session_key: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            session_key: session_key.to_string(),
        }
    }
}

/// One load state as the component sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadView {
    /// Lifecycle phase
    pub phase: Phase,
    /// Value once loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Payload>,
    /// Failure text once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&LoadState> for LoadView {
    fn from(state: &LoadState) -> Self {
        Self {
            phase: state.phase(),
            value: state.value().map(|v| v.as_ref().clone()),
            error: state.failure().map(ToString::to_string),
        }
    }
}

/// Read-only snapshot of every load state the component reads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderView {
    /// Props the view was rendered with
    pub props: RenderProps,
    /// Load states by name
    pub loads: BTreeMap<String, LoadView>,
}

impl RenderView {
    /// Phase of one load
    #[must_use]
    pub fn phase(&self, load: &str) -> Option<Phase> {
        self.loads.get(load).map(|l| l.phase)
    }

    /// JSON value of one load
    #[must_use]
    pub fn json(&self, load: &str) -> Option<&serde_json::Value> {
        self.loads.get(load)?.value.as_ref()?.as_json()
    }

    /// Check if every load is `Loaded`
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.loads.values().all(|l| l.phase == Phase::Loaded)
    }

    /// Number of snapshot lines in a text load
    #[must_use]
    pub fn line_count(&self, load: &str) -> usize {
        self.loads
            .get(load)
            .and_then(|l| l.value.as_ref())
            .and_then(Payload::as_text)
            .map_or(0, |text| text.lines().filter(|l| !l.trim().is_empty()).count())
    }

    /// Number of result rows in a JSON load
    #[must_use]
    pub fn result_count(&self, load: &str) -> usize {
        self.json(load)
            .and_then(|v| v["results"].as_array())
            .map_or(0, Vec::len)
    }
}
