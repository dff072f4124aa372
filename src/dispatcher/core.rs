use super::context::Context;
use crate::router::{Router, Target};
use crate::server::request::{RawRequest, Request};
use crate::server::response::Response;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Default request-body limit, shared with [`ServerSettings`](crate::config::ServerSettings).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Result every handler returns. `Err` becomes a `500` response.
pub type HandlerResult = anyhow::Result<()>;

/// A request handler.
///
/// Any `Fn(&mut Context) -> HandlerResult` that is `Send + Sync` is a
/// handler, so plain functions and closures can be registered directly.
pub trait Handler: Send + Sync + 'static {
    /// # Errors
    ///
    /// Any error is logged and answered with `500 Internal Server Error`.
    fn handle(&self, ctx: &mut Context) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut Context) -> HandlerResult {
        self(ctx)
    }
}

/// The backend-agnostic dispatch boundary.
///
/// Every adapter turns its transport event into a [`RawRequest`] and calls
/// [`dispatch`](Self::dispatch). Per-request failures stop here: an unmatched
/// route is a `404`, a handler error or panic is a `500`, and nothing
/// propagates to the listener.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    max_body_bytes: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn new(router: Arc<Router>, max_body_bytes: usize) -> Self {
        Self {
            router,
            max_body_bytes,
        }
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Decode `raw`, route it and produce the response.
    #[must_use]
    pub fn dispatch(&self, raw: RawRequest) -> Response {
        if raw.body.len() > self.max_body_bytes {
            warn!(
                method = %raw.method,
                request_target = %raw.target,
                body_bytes = raw.body.len(),
                limit = self.max_body_bytes,
                "Request body too large"
            );
            return Response::status_only(StatusCode::PAYLOAD_TOO_LARGE);
        }
        self.dispatch_request(Request::from_raw(raw))
    }

    /// Route an already decoded request.
    #[must_use]
    pub fn dispatch_request(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_string();

        let response = match self.router.resolve(&method, &path) {
            None => {
                debug!(method = %method, path = %path, "No route matched");
                Response::status_only(StatusCode::NOT_FOUND)
            }
            Some(matched) => match matched.target {
                Target::Resource(resource) => {
                    let mut res = Response::new(StatusCode::OK);
                    res.headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static(resource.content_type),
                    );
                    res.body = resource.body.into_owned();
                    res
                }
                Target::Handler(handler) => {
                    let pattern = matched.route.pattern.as_str();
                    let mut ctx = Context::new(request, matched.params);
                    match catch_unwind(AssertUnwindSafe(|| handler.handle(&mut ctx))) {
                        Ok(Ok(())) => ctx.into_response(),
                        Ok(Err(err)) => {
                            error!(
                                method = %method,
                                path = %path,
                                pattern = %pattern,
                                error = %format!("{err:#}"),
                                "Handler failed"
                            );
                            Response::status_only(StatusCode::INTERNAL_SERVER_ERROR)
                        }
                        Err(panic) => {
                            error!(
                                method = %method,
                                path = %path,
                                pattern = %pattern,
                                panic_message = %panic_message(panic.as_ref()),
                                "Handler panicked"
                            );
                            Response::status_only(StatusCode::INTERNAL_SERVER_ERROR)
                        }
                    }
                }
            },
        };

        debug!(
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            duration_us = start.elapsed().as_micros() as u64,
            "Request dispatched"
        );
        response
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use crate::static_files::ResourceRoot;
    use crate::ResourceBundle;
    use http::Method;

    fn dispatcher() -> Dispatcher {
        let bundle = ResourceBundle::new().with("www/index.html", b"<h1>home</h1>");
        let router = Router::builder()
            .get("/hello/{name}", |ctx: &mut Context| -> HandlerResult {
                let name = ctx.path_param("name").unwrap_or_default().to_string();
                ctx.ok(format!("Hello {name}"));
                Ok(())
            })
            .get("/fail", |_: &mut Context| -> HandlerResult {
                anyhow::bail!("database unavailable")
            })
            .get("/panic", |_: &mut Context| -> HandlerResult { panic!("boom") })
            .static_files("/www", ResourceRoot::bundled(bundle, "www"))
            .build()
            .unwrap();
        Dispatcher::new(Arc::new(router), 16)
    }

    #[test]
    fn test_handler_response() {
        let res = dispatcher().dispatch(RawRequest::new(Method::GET, "/hello/world"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, b"Hello world");
    }

    #[test]
    fn test_not_found() {
        let d = dispatcher();
        for _ in 0..2 {
            let res = d.dispatch(RawRequest::new(Method::GET, "/nowhere"));
            assert_eq!(res.status, StatusCode::NOT_FOUND);
        }
        let res = d.dispatch(RawRequest::new(Method::POST, "/hello/world"));
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_errors_and_panics_become_500() {
        let d = dispatcher();
        let res = d.dispatch(RawRequest::new(Method::GET, "/fail"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!String::from_utf8_lossy(&res.body).contains("database"));

        let res = d.dispatch(RawRequest::new(Method::GET, "/panic"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

        // still serving after a panic
        let res = d.dispatch(RawRequest::new(Method::GET, "/hello/again"));
        assert_eq!(res.status, StatusCode::OK);
    }

    #[test]
    fn test_static_resource() {
        let res = dispatcher().dispatch(RawRequest::new(Method::GET, "/www/"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(res.body, b"<h1>home</h1>");
    }

    #[test]
    fn test_body_limit() {
        let mut raw = RawRequest::new(Method::GET, "/hello/big");
        raw.body = vec![b'x'; 17];
        let res = dispatcher().dispatch(raw);
        assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
