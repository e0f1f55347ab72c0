//! Rig Harness - isolated preview of the session-recording player
//!
//! Wires the interception layer and the load sequencer into one scenario:
//! the player mounts, fires its loads, and every request is answered from
//! fixtures. Missing fixtures and broken ordering surface as failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use rig_harness::prelude::*;
//!
//! let session = HarnessSession::mount(HarnessConfig::new())?;
//! let view = session.settle_checked().await?;
//! assert!(view.is_complete());
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod scenario;
pub mod session;
pub mod simulator;
pub mod view;

pub use config::{HarnessConfig, DEFAULT_SESSION_ID};
pub use error::HarnessError;
pub use scenario::{
    builtin_fixtures, describe_routes, recording_loads, recording_routes, EVENTS, INITIAL_LOADS,
    METADATA, SNAPSHOTS, SNAPSHOT_SOURCES,
};
pub use session::{HarnessSession, SessionReport};
pub use simulator::{run_simulator, SimulatorConfig, SimulatorReport, SimulatorStats, Violation};
pub use view::{LoadView, RenderProps, RenderView};

/// Common imports for mounting sessions
pub mod prelude {
    pub use crate::{
        HarnessConfig, HarnessError, HarnessSession, RenderProps, RenderView, SessionReport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
