//! Route handlers
//!
//! Provides [`Handler`], the per-route answer owned by the route table for
//! the lifetime of a harness session.

use crate::error::ResolveError;
use crate::payload::Response;
use crate::predicate::{BodyPredicate, QueryPredicate, RequestPredicate};
use crate::request::InterceptedRequest;
use std::fmt;
use std::sync::Arc;

/// Computed handler: a function of the concrete request
pub type ComputeFn =
    Arc<dyn Fn(&InterceptedRequest) -> Result<Response, ResolveError> + Send + Sync>;

/// One `(predicate, response)` pair
#[derive(Debug, Clone)]
pub struct Branch<P> {
    /// Label used in logs and call records
    pub name: String,
    /// Condition
    pub predicate: P,
    /// Response when the condition holds
    pub response: Response,
}

/// Ordered branches with an optional default
///
/// Predicates are evaluated in registration order and the first one that
/// holds wins.
#[derive(Debug, Clone)]
pub struct Branches<P> {
    branches: Vec<Branch<P>>,
    default: Option<Response>,
}

/// Outcome of evaluating a branch list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    /// A branch predicate held
    Branch {
        /// Branch label
        name: &'a str,
        /// Branch response
        response: &'a Response,
    },
    /// Nothing held; the declared default applies
    Default(&'a Response),
    /// Nothing held and there is no default
    Unmatched {
        /// Predicates evaluated
        tried: usize,
    },
}

impl<P> Default for Branches<P> {
    fn default() -> Self {
        Self {
            branches: Vec::new(),
            default: None,
        }
    }
}

impl<P: RequestPredicate> Branches<P> {
    /// Create empty branch list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a branch
    #[must_use]
    pub fn when(mut self, name: impl Into<String>, predicate: P, response: Response) -> Self {
        self.branches.push(Branch {
            name: name.into(),
            predicate,
            response,
        });
        self
    }

    /// Set the response used when no branch holds
    #[inline]
    #[must_use]
    pub fn otherwise(mut self, response: Response) -> Self {
        self.default = Some(response);
        self
    }

    /// Branches in evaluation order
    #[inline]
    #[must_use]
    pub fn branches(&self) -> &[Branch<P>] {
        &self.branches
    }

    /// Declared default
    #[inline]
    #[must_use]
    pub fn default_response(&self) -> Option<&Response> {
        self.default.as_ref()
    }

    /// Pick the response for a request
    #[must_use]
    pub fn select(&self, request: &InterceptedRequest) -> Selection<'_> {
        for branch in &self.branches {
            if branch.predicate.matches(request) {
                return Selection::Branch {
                    name: &branch.name,
                    response: &branch.response,
                };
            }
        }
        match &self.default {
            Some(response) => Selection::Default(response),
            None => Selection::Unmatched {
                tried: self.branches.len(),
            },
        }
    }
}

/// What a route answers with
#[derive(Clone)]
pub enum Handler {
    /// Always the same response
    Literal(Response),
    /// Response computed from the request
    Computed(ComputeFn),
    /// First matching query-param branch
    QueryBranches(Branches<QueryPredicate>),
    /// First matching body branch
    BodyBranches(Branches<BodyPredicate>),
}

impl Handler {
    /// Literal handler
    #[inline]
    #[must_use]
    pub fn literal(response: Response) -> Self {
        Self::Literal(response)
    }

    /// Computed handler
    #[inline]
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&InterceptedRequest) -> Result<Response, ResolveError> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Short kind label for logs
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Computed(_) => "computed",
            Self::QueryBranches(_) => "query-branches",
            Self::BodyBranches(_) => "body-branches",
        }
    }
}

impl From<Response> for Handler {
    fn from(response: Response) -> Self {
        Self::Literal(response)
    }
}

impl From<Branches<QueryPredicate>> for Handler {
    fn from(branches: Branches<QueryPredicate>) -> Self {
        Self::QueryBranches(branches)
    }
}

impl From<Branches<BodyPredicate>> for Handler {
    fn from(branches: Branches<BodyPredicate>) -> Self {
        Self::BodyBranches(branches)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(response) => f.debug_tuple("Literal").field(response).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
            Self::QueryBranches(branches) => {
                f.debug_tuple("QueryBranches").field(branches).finish()
            }
            Self::BodyBranches(branches) => f.debug_tuple("BodyBranches").field(branches).finish(),
        }
    }
}
