//! Rig Sequencer - dependent asynchronous load sequencing
//!
//! Issues data-load operations against a transport while honouring declared
//! dependencies: a load that needs state produced by another load is issued
//! exactly once, when that state's *value* becomes available, never when its
//! loader is merely called.
//!
//! - **Load states**: `unloaded → loading → {loaded | failed}`, one watch
//!   channel per state
//! - **Dependency graph**: acyclic, validated when the sequencer is built
//! - **Trace**: every request, deferral, issue and settlement, in order
//!
//! # Example
//!
//! ```rust,ignore
//! use rig_sequencer::prelude::*;
//!
//! let mut builder = SequencerBuilder::new(transport);
//! builder.add_load("metadata", RequestOperation::get("/api/recording/1"))?;
//! builder.add_load("events", events_operation)?;
//! builder.add_dependency("events", "metadata")?;
//! let sequencer = builder.build();
//!
//! sequencer.start_load("metadata")?;
//! sequencer.start_load("events")?; // deferred until metadata is loaded
//! sequencer.settled().await;
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod graph;
pub mod key;
pub mod operation;
pub mod sequencer;
pub mod state;
pub mod store;
pub mod trace;

pub use error::{FailureReason, LoadFailure, SequencerError, TransitionError};
pub use graph::DependencyGraph;
pub use key::LoadKey;
pub use operation::{LoadContext, LoadOperation, RequestOperation};
pub use sequencer::{Sequencer, SequencerBuilder, SequencerConfig, StartOutcome};
pub use state::{allowed_transitions, validate_transition, LoadState, Phase};
pub use store::StateStore;
pub use trace::{OrderingViolation, Trace, TraceEvent, TraceEventKind};

/// Common imports for declaring and running loads
pub mod prelude {
    pub use crate::{
        LoadContext, LoadFailure, LoadKey, LoadOperation, LoadState, Phase, RequestOperation,
        Sequencer, SequencerBuilder, SequencerConfig, StartOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
