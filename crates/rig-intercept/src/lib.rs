//! Rig Intercept - request interception for fixture harnesses
//!
//! Intercepts outgoing HTTP-like calls and resolves each one against an
//! explicitly constructed route table:
//! - **Route matching**: method + path template with dynamic segments
//! - **Response resolution**: literal, computed, or content-branching handlers
//! - **Fixture store**: named datasets, JSON or raw text
//!
//! # Example
//!
//! ```rust,ignore
//! use rig_intercept::prelude::*;
//!
//! let mut builder = RouteTable::builder();
//! builder.route(Method::Get, "/resource/:id", Handler::literal(Response::json(payload)))?;
//! let table = builder.build();
//!
//! let interceptor = Interceptor::new(table, InterceptorConfig::new());
//! let response = interceptor.dispatch(RawRequest::get("/resource/42")).await?;
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod fixtures;
pub mod handler;
pub mod interceptor;
pub mod method;
pub mod payload;
pub mod predicate;
pub mod request;
pub mod resolver;
pub mod router;
pub mod template;

pub use error::{ConfigurationError, FixtureError, InterceptError, ResolveError, TemplateError};
pub use fixtures::FixtureStore;
pub use handler::{Branch, Branches, ComputeFn, Handler, Selection};
pub use interceptor::{Interceptor, InterceptorConfig, LatencyModel, RecordedCall, Transport};
pub use method::{Method, UnknownMethod};
pub use payload::{Payload, Response, JSON_CONTENT_TYPE, NDJSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
pub use predicate::{BodyPredicate, QueryPredicate, RequestPredicate};
pub use request::{InterceptedRequest, PathParams, QueryParams, RawRequest};
pub use resolver::{resolve, resolve_labeled};
pub use router::{Route, RouteId, RouteMatch, RouteSpec, RouteTable, RouteTableBuilder};
pub use template::{PathTemplate, Segment};

/// Common imports for building route tables and dispatching requests
pub mod prelude {
    pub use crate::{
        BodyPredicate, Branches, FixtureStore, Handler, InterceptError, InterceptedRequest,
        Interceptor, InterceptorConfig, LatencyModel, Method, Payload, QueryPredicate, RawRequest, Response,
        RouteTable, Transport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
