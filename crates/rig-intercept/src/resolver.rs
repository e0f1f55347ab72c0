//! Response resolution
//!
//! Given a matched route and the concrete request:
//! 1. Query branches: first predicate over query params that holds wins
//! 2. Body branches: first predicate over the parsed body that holds wins
//! 3. Literal: the handler's response
//! 4. No branch held: the declared default, or a [`ResolveError::ResolutionGap`]
//!
//! Computed handlers run the route's own function and propagate its error.

use crate::error::ResolveError;
use crate::handler::{Branches, Handler, Selection};
use crate::payload::Response;
use crate::predicate::RequestPredicate;
use crate::request::InterceptedRequest;
use crate::router::Route;

/// Resolve a request against its matched route
///
/// # Errors
/// - `ResolveError::ResolutionGap` if a branching handler has no matching
///   branch and no default
/// - `ResolveError::Handler` if a computed handler fails
pub fn resolve(route: &Route, request: &InterceptedRequest) -> Result<Response, ResolveError> {
    resolve_labeled(route, request).map(|(response, _)| response)
}

/// Resolve and also report which branch answered
///
/// The label is the branch name, `"default"`, `"literal"` or `"computed"`.
///
/// # Errors
/// Same as [`resolve`]
pub fn resolve_labeled(
    route: &Route,
    request: &InterceptedRequest,
) -> Result<(Response, String), ResolveError> {
    match &route.handler {
        Handler::QueryBranches(branches) => select_labeled(route, branches, request),
        Handler::BodyBranches(branches) => select_labeled(route, branches, request),
        Handler::Literal(response) => Ok((response.clone(), "literal".to_string())),
        Handler::Computed(compute) => Ok((compute(request)?, "computed".to_string())),
    }
}

fn select_labeled<P: RequestPredicate>(
    route: &Route,
    branches: &Branches<P>,
    request: &InterceptedRequest,
) -> Result<(Response, String), ResolveError> {
    match branches.select(request) {
        Selection::Branch { name, response } => {
            tracing::debug!(route = %route.spec, branch = name, "branch selected");
            Ok((response.clone(), name.to_string()))
        }
        Selection::Default(response) => {
            tracing::debug!(route = %route.spec, "no branch matched, using default");
            Ok((response.clone(), "default".to_string()))
        }
        Selection::Unmatched { tried } => {
            tracing::error!(route = %route.spec, tried, "resolution gap");
            Err(ResolveError::ResolutionGap {
                method: route.spec.method,
                route: route.spec.template.to_string(),
                branches_tried: tried,
            })
        }
    }
}
