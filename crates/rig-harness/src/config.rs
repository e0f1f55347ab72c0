//! Harness configuration
//!
//! Read from TOML; every field is optional and falls back to [`Default`].
//!
//! ```toml
//! team_id = 2
//! session_id = "0189e55b-7a10-7b1b-8c4e-3f2d9a6b1e21"
//! latency_ms = 20
//! latency_jitter_ms = 80
//! seed = 7
//! fixtures_dir = "fixtures/recording"
//! start_prerequisites = false
//! ```

use crate::error::HarnessError;
use crate::view::RenderProps;
use rig_intercept::LatencyModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Session id of the built-in recording fixture
pub const DEFAULT_SESSION_ID: &str = "0189e55b-7a10-7b1b-8c4e-3f2d9a6b1e21";

/// Harness session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Project the recording belongs to
    pub team_id: u64,
    /// Recording to preview
    pub session_id: String,
    /// Key scoping the player's state
    pub session_key: String,
    /// Base latency of every simulated call
    pub latency_ms: u64,
    /// Extra per-call latency drawn from `0..=latency_jitter_ms`
    pub latency_jitter_ms: Option<u64>,
    /// Seed for jittered latency
    pub seed: Option<u64>,
    /// Directory whose datasets override the built-in fixtures
    pub fixtures_dir: Option<PathBuf>,
    /// Starting a dependent load also starts its prerequisites
    pub start_prerequisites: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            team_id: 2,
            session_id: DEFAULT_SESSION_ID.to_string(),
            session_key: "recording-preview".to_string(),
            latency_ms: 0,
            latency_jitter_ms: None,
            seed: None,
            fixtures_dir: None,
            start_prerequisites: false,
        }
    }
}

impl HarnessConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// `HarnessError::ConfigIo`, `HarnessError::ConfigParse`, or
    /// `HarnessError::InvalidConfig` from [`Self::validate`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| HarnessError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| HarnessError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "loaded harness config");
        Ok(config)
    }

    /// Check field consistency
    ///
    /// # Errors
    /// `HarnessError::InvalidConfig` when the session id is empty or is not
    /// a single path segment
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.session_id.trim().is_empty() {
            return Err(HarnessError::InvalidConfig("session_id is empty".to_string()));
        }
        if self.session_id.contains(['/', '?', '#']) {
            return Err(HarnessError::InvalidConfig(format!(
                "session_id {:?} must be a single path segment",
                self.session_id
            )));
        }
        Ok(())
    }

    /// With recording to preview
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>, session_key: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self.session_key = session_key.into();
        self
    }

    /// With base latency and optional seeded jitter
    #[must_use]
    pub fn with_latency(mut self, latency_ms: u64, jitter_ms: Option<u64>, seed: Option<u64>) -> Self {
        self.latency_ms = latency_ms;
        self.latency_jitter_ms = jitter_ms;
        self.seed = seed;
        self
    }

    /// With fixture override directory
    #[must_use]
    pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = Some(dir.into());
        self
    }

    /// With prerequisite auto-start
    #[must_use]
    pub fn with_start_prerequisites(mut self, enabled: bool) -> Self {
        self.start_prerequisites = enabled;
        self
    }

    /// Props handed to the rendering façade
    #[must_use]
    pub fn render_props(&self) -> RenderProps {
        RenderProps::new(&self.session_id, &self.session_key)
    }

    /// Interceptor latency for these settings
    #[must_use]
    pub fn latency_model(&self) -> LatencyModel {
        let base = Duration::from_millis(self.latency_ms);
        match self.latency_jitter_ms {
            Some(jitter) if jitter > 0 => LatencyModel::Seeded {
                seed: self.seed.unwrap_or_default(),
                min: base,
                max: base + Duration::from_millis(jitter),
            },
            _ if self.latency_ms > 0 => LatencyModel::Fixed(base),
            _ => LatencyModel::None,
        }
    }
}
