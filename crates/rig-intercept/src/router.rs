//! Route table and matcher
//!
//! The table is built once through [`RouteTableBuilder`], which rejects
//! duplicate and overlapping templates, and is immutable afterwards. Because
//! no two routes of one method can match a common path, [`RouteTable::find`]
//! has at most one answer and registration order never decides a match.

use crate::error::ConfigurationError;
use crate::handler::Handler;
use crate::method::Method;
use crate::request::PathParams;
use crate::template::PathTemplate;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Index of a route in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(pub usize);

impl Display for RouteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

/// Method plus path template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteSpec {
    /// Method
    pub method: Method,
    /// Path template
    pub template: PathTemplate,
}

impl Display for RouteSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

/// Registered route
#[derive(Debug, Clone)]
pub struct Route {
    /// Registration index
    pub id: RouteId,
    /// Method and template
    pub spec: RouteSpec,
    /// Answer
    pub handler: Handler,
}

/// A route matched against a concrete path
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// Matched route
    pub route: &'a Route,
    /// Params extracted from dynamic segments
    pub params: PathParams,
}

/// Builder enforcing route uniqueness at registration time
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route
    ///
    /// # Errors
    /// - `ConfigurationError::InvalidTemplate` if the template does not parse
    /// - `ConfigurationError::DuplicateRoute` if the same method and template
    ///   shape is already registered
    /// - `ConfigurationError::AmbiguousRoute` if an existing template of the
    ///   same method can match a common concrete path
    pub fn route(
        &mut self,
        method: Method,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteId, ConfigurationError> {
        let template = PathTemplate::parse(template)?;

        for existing in self.routes.iter().filter(|r| r.spec.method == method) {
            if existing.spec.template.same_shape(&template) {
                return Err(ConfigurationError::DuplicateRoute {
                    method,
                    template: template.to_string(),
                });
            }
            if existing.spec.template.overlaps(&template) {
                return Err(ConfigurationError::AmbiguousRoute {
                    method,
                    existing: existing.spec.template.to_string(),
                    incoming: template.to_string(),
                });
            }
        }

        let id = RouteId(self.routes.len());
        let handler = handler.into();
        tracing::debug!(%id, %method, %template, kind = handler.kind(), "registered route");
        self.routes.push(Route {
            id,
            spec: RouteSpec { method, template },
            handler,
        });
        Ok(id)
    }

    /// Number of registered routes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if no routes are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze into a table
    #[must_use]
    pub fn build(self) -> RouteTable {
        let mut by_method: BTreeMap<Method, Vec<usize>> = BTreeMap::new();
        for (index, route) in self.routes.iter().enumerate() {
            by_method.entry(route.spec.method).or_default().push(index);
        }
        RouteTable {
            routes: self.routes,
            by_method,
        }
    }
}

/// Immutable route table
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    by_method: BTreeMap<Method, Vec<usize>>,
}

impl RouteTable {
    /// Start building a table
    #[inline]
    #[must_use]
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// Build from a `method → template → handler` registration map
    ///
    /// # Errors
    /// The first [`ConfigurationError`] raised while registering
    pub fn from_registration(
        registration: BTreeMap<Method, BTreeMap<String, Handler>>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = RouteTableBuilder::new();
        for (method, templates) in registration {
            for (template, handler) in templates {
                builder.route(method, &template, handler)?;
            }
        }
        Ok(builder.build())
    }

    /// Find the route for a concrete method and path
    ///
    /// `path` must not carry a query string.
    #[must_use]
    pub fn find(&self, method: Method, path: &str) -> Option<RouteMatch<'_>> {
        let candidates = self.by_method.get(&method)?;
        candidates.iter().find_map(|&index| {
            let route = &self.routes[index];
            route
                .spec
                .template
                .matches(path)
                .map(|params| RouteMatch { route, params })
        })
    }

    /// Route by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id.0)
    }

    /// All routes in registration order
    #[inline]
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// All route specs in registration order
    pub fn specs(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter().map(|r| &r.spec)
    }

    /// Number of routes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
