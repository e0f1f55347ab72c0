//! Interceptor: the simulated backend
//!
//! Sits where the network would be. Every dispatched request is parsed,
//! matched, resolved and recorded; the only suspension point is the
//! configured latency between interception and delivery of the response.

use crate::error::InterceptError;
use crate::payload::Response;
use crate::request::{InterceptedRequest, QueryParams, RawRequest};
use crate::resolver::resolve_labeled;
use crate::router::RouteTable;
use crate::method::Method;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delay between intercepting a request and answering it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyModel {
    /// Answer without sleeping (still yields to the runtime)
    #[default]
    None,
    /// Same delay for every call
    Fixed(Duration),
    /// Per-call delay drawn from a seeded RNG in `min..=max`
    Seeded {
        /// RNG seed
        seed: u64,
        /// Lower bound
        min: Duration,
        /// Upper bound
        max: Duration,
    },
}

/// Interceptor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorConfig {
    /// Latency model
    pub latency: LatencyModel,
    /// Keep a log of every dispatched call
    pub record_calls: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            latency: LatencyModel::None,
            record_calls: true,
        }
    }
}

impl InterceptorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With latency model
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: LatencyModel) -> Self {
        self.latency = latency;
        self
    }

    /// With call recording switched on or off
    #[inline]
    #[must_use]
    pub fn with_recording(mut self, record_calls: bool) -> Self {
        self.record_calls = record_calls;
        self
    }
}

/// One intercepted call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedCall {
    /// Interception order, starting at 0
    pub seq: u64,
    /// Method
    pub method: Method,
    /// Path without query
    pub path: String,
    /// Decoded query params
    pub query: QueryParams,
    /// Matched route template, if any
    pub route: Option<String>,
    /// Branch label that answered
    pub branch: Option<String>,
    /// Response status, if resolved
    pub status: Option<u16>,
    /// Error text, if dispatch failed
    pub error: Option<String>,
}

/// Something that answers requests asynchronously
///
/// The seam between load operations and the (simulated) backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and await its response
    async fn send(&self, request: RawRequest) -> Result<Response, InterceptError>;
}

/// Route-table backed transport
#[derive(Debug)]
pub struct Interceptor {
    table: Arc<RouteTable>,
    config: InterceptorConfig,
    calls: Mutex<Vec<RecordedCall>>,
    rng: Mutex<Option<StdRng>>,
    seq: AtomicU64,
}

impl Interceptor {
    /// Create interceptor over a built route table
    #[must_use]
    pub fn new(table: impl Into<Arc<RouteTable>>, config: InterceptorConfig) -> Self {
        let rng = match config.latency {
            LatencyModel::Seeded { seed, .. } => Some(StdRng::seed_from_u64(seed)),
            LatencyModel::None | LatencyModel::Fixed(_) => None,
        };
        Self {
            table: table.into(),
            config,
            calls: Mutex::new(Vec::new()),
            rng: Mutex::new(rng),
            seq: AtomicU64::new(0),
        }
    }

    /// Route table
    #[inline]
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Dispatch a request
    ///
    /// Resolution happens at interception time; the response is delivered
    /// after the configured latency.
    ///
    /// # Errors
    /// - `InterceptError::NoMatch` if no route matches (a fixture gap; never
    ///   turned into an empty success)
    /// - `InterceptError::MalformedRequest` if the request does not parse
    /// - `InterceptError::Resolution` if the matched route cannot answer
    pub async fn dispatch(&self, raw: RawRequest) -> Result<Response, InterceptError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let outcome = self.intercept(seq, &raw);

        let delay = self.next_delay();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    fn intercept(&self, seq: u64, raw: &RawRequest) -> Result<Response, InterceptError> {
        let request = match InterceptedRequest::parse(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(seq, method = %raw.method, url = %raw.url, error = %e, "malformed request");
                self.record(RecordedCall {
                    seq,
                    method: raw.method,
                    path: raw.url.clone(),
                    query: QueryParams::new(),
                    route: None,
                    branch: None,
                    status: None,
                    error: Some(e.to_string()),
                });
                return Err(e);
            }
        };

        let Some(found) = self.table.find(request.method(), request.path()) else {
            let err = InterceptError::NoMatch {
                method: request.method(),
                path: request.path().to_string(),
            };
            tracing::error!(seq, method = %request.method(), path = request.path(), "no fixture route");
            self.record(RecordedCall {
                seq,
                method: request.method(),
                path: request.path().to_string(),
                query: request.query().clone(),
                route: None,
                branch: None,
                status: None,
                error: Some(err.to_string()),
            });
            return Err(err);
        };

        let request = request.with_path_params(found.params);
        let route = found.route.spec.template.to_string();
        let result = resolve_labeled(found.route, &request);

        let (branch, status, error) = match &result {
            Ok((response, branch)) => (Some(branch.clone()), Some(response.status), None),
            Err(e) => (None, None, Some(e.to_string())),
        };
        tracing::debug!(seq, method = %request.method(), path = request.path(), route = %route, ?status, "intercepted");
        self.record(RecordedCall {
            seq,
            method: request.method(),
            path: request.path().to_string(),
            query: request.query().clone(),
            route: Some(route),
            branch,
            status,
            error,
        });

        result
            .map(|(response, _)| response)
            .map_err(InterceptError::from)
    }

    fn next_delay(&self) -> Duration {
        match self.config.latency {
            LatencyModel::None => Duration::ZERO,
            LatencyModel::Fixed(delay) => delay,
            LatencyModel::Seeded { min, max, .. } => {
                if max <= min {
                    return min;
                }
                let mut guard = self.rng.lock();
                let Some(rng) = guard.as_mut() else {
                    return min;
                };
                let min_ms = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
                let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
                Duration::from_millis(rng.random_range(min_ms..=max_ms))
            }
        }
    }

    fn record(&self, call: RecordedCall) {
        if self.config.record_calls {
            // `seq` is drawn before the lock; concurrent dispatches can arrive out of order.
            let mut calls = self.calls.lock();
            let at = calls.partition_point(|c| c.seq < call.seq);
            calls.insert(at, call);
        }
    }

    /// All recorded calls in interception order
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Recorded calls answered by one route template
    #[must_use]
    pub fn calls_to(&self, template: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.route.as_deref() == Some(template))
            .cloned()
            .collect()
    }

    /// Number of recorded calls
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Transport for Interceptor {
    async fn send(&self, request: RawRequest) -> Result<Response, InterceptError> {
        self.dispatch(request).await
    }
}
