//! Harness errors
//!
//! Setup problems (bad routes, missing fixtures, bad config) abort the
//! session before anything is issued. Load failures are collected and
//! surfaced after the session settles.

use rig_intercept::{ConfigurationError, FixtureError};
use rig_sequencer::{LoadFailure, SequencerError};
use std::path::PathBuf;

/// Main harness error type
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Route registration rejected
    #[error("route configuration failed: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Fixture dataset missing or unreadable
    #[error("fixture error: {0}")]
    Fixture(#[from] FixtureError),

    /// Load declarations rejected
    #[error("load declaration failed: {0}")]
    Sequencer(#[from] SequencerError),

    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::HarnessConfig`]
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Config values are inconsistent
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// One or more loads failed or were blocked
    #[error("{count} load(s) failed: {summary}", count = .0.len(), summary = summarize(.0))]
    LoadsFailed(Vec<LoadFailure>),

    /// Session already unmounted
    #[error("session is unmounted")]
    Unmounted,
}

fn summarize(failures: &[LoadFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl HarnessError {
    /// Check if the error is a harness configuration gap
    ///
    /// Route, fixture and config errors mean the harness itself is
    /// incomplete, as do load failures caused by unmatched requests.
    #[must_use]
    pub fn is_configuration_gap(&self) -> bool {
        match self {
            Self::Configuration(_)
            | Self::Fixture(_)
            | Self::Sequencer(_)
            | Self::ConfigIo { .. }
            | Self::ConfigParse { .. }
            | Self::InvalidConfig(_) => true,
            Self::LoadsFailed(failures) => failures.iter().any(LoadFailure::is_fixture_gap),
            Self::Unmounted => false,
        }
    }

    /// Check if the error aborts the session before any load is issued
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::LoadsFailed(_) | Self::Unmounted)
    }
}
