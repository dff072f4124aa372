use super::core::{Action, MethodFilter, Route, Router};
use super::pattern::{join_paths, PathPattern};
use crate::dispatcher::Handler;
use crate::error::RouteError;
use crate::static_files::{ResourceRoot, StaticMount};
use http::Method;
use std::sync::Arc;
use tracing::debug;

/// Appends `(method, pattern, action)` entries to a route table, then freezes
/// it with [`build`](Self::build).
///
/// Declaration errors do not interrupt chaining: the first one is kept and
/// returned by `build`, so a malformed pattern is reported before any server
/// starts.
///
/// ```rust,ignore
/// let router = Router::builder()
///     .mount("/api", |api| api
///         .get("/users/{id}", |ctx: &mut Context| -> HandlerResult { ctx.ok("user"); Ok(()) }))
///     .static_root(ResourceRoot::directory("public"))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RouterBuilder {
    routes: Vec<Route>,
    prefix: String,
    error: Option<RouteError>,
}

impl RouterBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `pattern` (joined with the current
    /// mount prefix).
    #[must_use]
    pub fn route<H: Handler>(
        self,
        method: impl Into<MethodFilter>,
        pattern: &str,
        handler: H,
    ) -> Self {
        self.push(method.into(), pattern, Action::Handler(Arc::new(handler)))
    }

    #[must_use]
    pub fn get<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::GET, pattern, handler)
    }

    #[must_use]
    pub fn post<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::POST, pattern, handler)
    }

    #[must_use]
    pub fn put<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::PUT, pattern, handler)
    }

    #[must_use]
    pub fn delete<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::DELETE, pattern, handler)
    }

    #[must_use]
    pub fn patch<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::PATCH, pattern, handler)
    }

    #[must_use]
    pub fn head<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::HEAD, pattern, handler)
    }

    #[must_use]
    pub fn options<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::OPTIONS, pattern, handler)
    }

    #[must_use]
    pub fn trace<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::TRACE, pattern, handler)
    }

    /// Register `handler` for every method.
    #[must_use]
    pub fn any<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(MethodFilter::Any, pattern, handler)
    }

    /// Serve `root` on `GET` requests under `pattern`.
    ///
    /// A pattern without a trailing `*` gets one appended, so `/pub` and
    /// `/pub/*` mount the same way.
    #[must_use]
    pub fn static_files(self, pattern: &str, root: ResourceRoot) -> Self {
        let pattern = if pattern.ends_with("/*") {
            pattern.to_string()
        } else {
            join_paths(pattern, "*")
        };
        let mount = StaticMount::new(root);
        self.push(
            MethodFilter::Exact(Method::GET),
            &pattern,
            Action::Static(Arc::new(mount)),
        )
    }

    /// Serve `root` on `GET /*` relative to the current mount prefix.
    #[must_use]
    pub fn static_root(self, root: ResourceRoot) -> Self {
        self.static_files("/*", root)
    }

    /// Declare child routes under `prefix`.
    ///
    /// The prefix is concatenated with each child pattern when the child is
    /// declared; the resulting table stays flat.
    #[must_use]
    pub fn mount<F>(mut self, prefix: &str, children: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let parent = std::mem::take(&mut self.prefix);
        self.prefix = join_paths(&parent, prefix);
        let mut builder = children(self);
        builder.prefix = parent;
        builder
    }

    /// Freeze the table.
    ///
    /// # Errors
    ///
    /// Returns the first [`RouteError`] hit while declaring routes.
    pub fn build(self) -> Result<Router, RouteError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        debug!(routes = self.routes.len(), "Route table frozen");
        Ok(Router::from_routes(self.routes))
    }

    fn push(mut self, method: MethodFilter, pattern: &str, action: Action) -> Self {
        if self.error.is_some() {
            return self;
        }
        let full = if self.prefix.is_empty() {
            pattern.to_string()
        } else {
            join_paths(&self.prefix, pattern)
        };
        match PathPattern::parse(&full) {
            Ok(pattern) => self.routes.push(Route {
                method,
                pattern,
                action,
            }),
            Err(err) => self.error = Some(err),
        }
        self
    }
}
