//! Load operations
//!
//! An operation turns the values of its prerequisites into a request, sends
//! it through the transport and hands back the response payload.

use crate::error::{FailureReason, LoadFailure};
use crate::key::LoadKey;
use async_trait::async_trait;
use rig_intercept::{Payload, RawRequest, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What an operation can see while it runs
///
/// Prerequisite values are captured when the operation is issued; they are
/// all `Loaded` by construction.
pub struct LoadContext {
    key: LoadKey,
    transport: Arc<dyn Transport>,
    prerequisites: HashMap<LoadKey, Arc<Payload>>,
}

impl LoadContext {
    /// Create context
    #[must_use]
    pub fn new(
        key: LoadKey,
        transport: Arc<dyn Transport>,
        prerequisites: HashMap<LoadKey, Arc<Payload>>,
    ) -> Self {
        Self {
            key,
            transport,
            prerequisites,
        }
    }

    /// Load being run
    #[inline]
    #[must_use]
    pub fn key(&self) -> &LoadKey {
        &self.key
    }

    /// Transport to send requests through
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Loaded value of a prerequisite
    #[inline]
    #[must_use]
    pub fn prerequisite(&self, key: &str) -> Option<&Payload> {
        self.prerequisites.get(key).map(AsRef::as_ref)
    }

    /// Loaded JSON value of a prerequisite
    #[inline]
    #[must_use]
    pub fn prerequisite_json(&self, key: &str) -> Option<&Value> {
        self.prerequisite(key).and_then(Payload::as_json)
    }

    /// Failure attributed to this load
    #[inline]
    #[must_use]
    pub fn fail(&self, reason: FailureReason) -> LoadFailure {
        LoadFailure::new(&self.key, reason)
    }
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("key", &self.key)
            .field("prerequisites", &self.prerequisites.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A data-load operation
#[async_trait]
pub trait LoadOperation: Send + Sync {
    /// Run the load
    async fn load(&self, ctx: &LoadContext) -> Result<Payload, LoadFailure>;
}

type BuildFn = dyn Fn(&LoadContext) -> Result<RawRequest, String> + Send + Sync;

/// Operation that sends one request built from the context
///
/// Non-2xx responses become `FailureReason::Status`; transport errors pass
/// through as `FailureReason::Transport`.
#[derive(Clone)]
pub struct RequestOperation {
    build: Arc<BuildFn>,
}

impl RequestOperation {
    /// Build the request from the context
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&LoadContext) -> Result<RawRequest, String> + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(build),
        }
    }

    /// Always send the same request
    #[must_use]
    pub fn fixed(request: RawRequest) -> Self {
        Self::new(move |_| Ok(request.clone()))
    }

    /// Always GET the same URL
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::fixed(RawRequest::get(url))
    }
}

impl fmt::Debug for RequestOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestOperation(..)")
    }
}

#[async_trait]
impl LoadOperation for RequestOperation {
    async fn load(&self, ctx: &LoadContext) -> Result<Payload, LoadFailure> {
        let request = (self.build)(ctx).map_err(|reason| ctx.fail(FailureReason::Operation(reason)))?;
        let response = ctx
            .transport()
            .send(request)
            .await
            .map_err(|e| ctx.fail(FailureReason::Transport(e)))?;

        if !response.is_success() {
            return Err(ctx.fail(FailureReason::Status(response.status)));
        }
        Ok(response.payload)
    }
}
