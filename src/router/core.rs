//! Router core module - hot path for request routing.
//!
//! The route table is an ordered `Vec` of [`Route`]s scanned in declaration
//! order. There is no specificity ranking: the first route whose method
//! filter and pattern both accept the request wins. Static mounts take part
//! in the same scan; a mount that has no resource for the requested suffix
//! lets the scan continue with the next route.

use super::pattern::{PathParams, PathPattern};
use crate::dispatcher::Handler;
use crate::static_files::{Resource, StaticMount};
use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Which request methods a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// Every method.
    Any,
    /// Exactly this method.
    Exact(Method),
}

impl MethodFilter {
    #[inline]
    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(m) => m == method,
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        Self::Exact(method)
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::Exact(m) => m.fmt(f),
        }
    }
}

/// What a route does once matched.
#[derive(Clone)]
pub enum Action {
    /// Invoke a handler with a fresh [`Context`](crate::dispatcher::Context).
    Handler(Arc<dyn Handler>),
    /// Serve the wildcard suffix from a resource root.
    Static(Arc<StaticMount>),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler"),
            Self::Static(mount) => f.debug_tuple("Static").field(mount).finish(),
        }
    }
}

/// A (method, pattern, action) entry of the route table.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: MethodFilter,
    pub pattern: PathPattern,
    pub action: Action,
}

impl Route {
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self.action, Action::Static(_))
    }
}

/// Result of successfully matching a request to a route.
#[derive(Debug)]
pub struct RouteMatch<'r> {
    /// The matched route from the frozen table.
    pub route: &'r Route,
    /// Parameters and wildcard text extracted from the path.
    pub params: PathParams,
    /// What to do with the request.
    pub target: Target<'r>,
}

/// The resolved target of a [`RouteMatch`].
pub enum Target<'r> {
    Handler(&'r Arc<dyn Handler>),
    Resource(Resource),
}

impl fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler"),
            Self::Resource(r) => f.debug_tuple("Resource").field(&r.name).finish(),
        }
    }
}

/// Immutable route table produced by [`RouterBuilder::build`](super::RouterBuilder::build).
///
/// `Router` holds no interior mutability, so it can be shared behind an
/// `Arc` and read concurrently from every connection without locking.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Start declaring routes.
    #[must_use]
    pub fn builder() -> super::RouterBuilder {
        super::RouterBuilder::new()
    }

    pub(crate) fn from_routes(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Routes in declaration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve a decoded request path to its first matching route.
    ///
    /// `None` means `NotFound`: no handler route matched, and no static mount
    /// whose pattern matched had a resource for the suffix.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        for route in &self.routes {
            if !route.method.accepts(method) {
                continue;
            }
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            match &route.action {
                Action::Handler(handler) => {
                    debug!(
                        method = %method,
                        path = %path,
                        pattern = %route.pattern,
                        params = params.len(),
                        "Route matched"
                    );
                    return Some(RouteMatch {
                        route,
                        params,
                        target: Target::Handler(handler),
                    });
                }
                Action::Static(mount) => {
                    let suffix = params.wildcard().unwrap_or_default();
                    if let Some(resource) = mount.resolve(suffix) {
                        debug!(
                            method = %method,
                            path = %path,
                            pattern = %route.pattern,
                            resource = %resource.name,
                            "Static resource matched"
                        );
                        return Some(RouteMatch {
                            route,
                            params,
                            target: Target::Resource(resource),
                        });
                    }
                    trace!(
                        path = %path,
                        pattern = %route.pattern,
                        suffix = %suffix,
                        "Static mount has no resource, continuing"
                    );
                }
            }
        }
        None
    }
}
