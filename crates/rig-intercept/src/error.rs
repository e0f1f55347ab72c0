//! Error types for request interception
//!
//! Three failure families, all surfaced to the harness operator:
//! - [`ConfigurationError`]: the route table itself is wrong (fatal at setup)
//! - [`ResolveError`]: a route matched but no branch or default applies
//! - [`InterceptError`]: a dispatched request could not be answered

use crate::method::Method;

/// Path template parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Empty segment between two slashes
    #[error("empty segment in template {0:?}")]
    EmptySegment(String),

    /// `:` with no name after it
    #[error("unnamed dynamic segment in template {0:?}")]
    UnnamedParam(String),

    /// Same parameter name used twice
    #[error("duplicate parameter {name:?} in template {template:?}")]
    DuplicateParam {
        /// Template text
        template: String,
        /// Repeated name
        name: String,
    },

    /// Template contains a query string
    #[error("template {0:?} must not contain a query string")]
    QueryInTemplate(String),
}

/// Route registration errors
///
/// Raised while building a [`RouteTable`](crate::RouteTable); a table that
/// builds is guaranteed unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Template failed to parse
    #[error("invalid route template: {0}")]
    InvalidTemplate(#[from] TemplateError),

    /// Same method and template registered twice
    #[error("duplicate route {method} {template}")]
    DuplicateRoute {
        /// Method
        method: Method,
        /// Template text
        template: String,
    },

    /// Two templates for one method match a common concrete path
    #[error("ambiguous routes for {method}: {existing} overlaps {incoming}")]
    AmbiguousRoute {
        /// Method
        method: Method,
        /// Already registered template
        existing: String,
        /// Template being registered
        incoming: String,
    },
}

/// Response resolution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    /// No branch predicate held and the route declares no default
    #[error("no branch of {method} {route} matched ({branches_tried} tried) and no default is declared")]
    ResolutionGap {
        /// Method of the matched route
        method: Method,
        /// Template of the matched route
        route: String,
        /// Number of branch predicates evaluated
        branches_tried: usize,
    },

    /// A computed handler rejected the request
    #[error("handler for {route} failed: {reason}")]
    Handler {
        /// Template of the matched route
        route: String,
        /// Handler-supplied reason
        reason: String,
    },
}

impl ResolveError {
    /// Construct a handler failure from inside a computed handler
    #[inline]
    pub fn handler(route: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Handler {
            route: route.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from dispatching an intercepted request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterceptError {
    /// No registered route matches; the fixture harness has a gap
    #[error("no fixture route for {method} {path}")]
    NoMatch {
        /// Request method
        method: Method,
        /// Request path (without query)
        path: String,
    },

    /// The request itself could not be parsed
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A route matched but resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolveError),
}

impl InterceptError {
    /// Check if the error points at missing or incomplete fixtures
    ///
    /// Both unmatched routes and resolution gaps mean the harness was asked
    /// for something it was never taught to answer.
    #[inline]
    #[must_use]
    pub fn is_fixture_gap(&self) -> bool {
        matches!(
            self,
            Self::NoMatch { .. } | Self::Resolution(ResolveError::ResolutionGap { .. })
        )
    }
}

/// Fixture store errors
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// Dataset not present in the store
    #[error("fixture dataset {0:?} not found")]
    Missing(String),

    /// Reading a fixture file failed
    #[error("failed to read fixture {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A `.json` fixture did not parse
    #[error("fixture {path} is not valid JSON: {source}")]
    Json {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_gap_classification() {
        let no_match = InterceptError::NoMatch {
            method: Method::Get,
            path: "/nope".to_string(),
        };
        assert!(no_match.is_fixture_gap());

        let gap = InterceptError::from(ResolveError::ResolutionGap {
            method: Method::Post,
            route: "/query".to_string(),
            branches_tried: 2,
        });
        assert!(gap.is_fixture_gap());

        let malformed = InterceptError::MalformedRequest("bad body".to_string());
        assert!(!malformed.is_fixture_gap());
        assert!(!InterceptError::from(ResolveError::handler("/x", "boom")).is_fixture_gap());
    }

    #[test]
    fn configuration_error_display() {
        let err = ConfigurationError::AmbiguousRoute {
            method: Method::Get,
            existing: "/a/:id".to_string(),
            incoming: "/a/new".to_string(),
        };
        assert_eq!(err.to_string(), "ambiguous routes for GET: /a/:id overlaps /a/new");
    }
}
