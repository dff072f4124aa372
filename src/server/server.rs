use super::port::{PortState, ServerPort};
use crate::config::ServerSettings;
use crate::error::ServerError;
use crate::router::Router;
use std::sync::Arc;

/// Owns one [`ServerPort`] and the frozen route table it serves.
///
/// The router is built before the server and never changes afterwards, so
/// routes cannot be added once the server has started.
///
/// ```rust,no_run
/// use routeport::dispatcher::{Context, HandlerResult};
/// use routeport::server::{Server, ThreadedAdapter};
/// use routeport::{Router, ServerSettings};
///
/// let router = Router::builder()
///     .get("/hello", |ctx: &mut Context| -> HandlerResult {
///         ctx.ok("Hello");
///         Ok(())
///     })
///     .build()?;
/// let mut server = Server::new(
///     ThreadedAdapter::new(),
///     router,
///     ServerSettings::default().with_port(0),
/// );
/// server.start()?;
/// println!("listening on {:?}", server.runtime_port());
/// server.stop();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Server {
    port: Box<dyn ServerPort>,
    router: Arc<Router>,
    settings: ServerSettings,
}

impl Server {
    #[must_use]
    pub fn new<P: ServerPort + 'static>(port: P, router: Router, settings: ServerSettings) -> Self {
        Self::with_port(Box::new(port), router, settings)
    }

    /// Like [`new`](Self::new) for an adapter chosen at runtime.
    #[must_use]
    pub fn with_port(port: Box<dyn ServerPort>, router: Router, settings: ServerSettings) -> Self {
        Self {
            port,
            router: Arc::new(router),
            settings,
        }
    }

    /// Bind the listener and begin serving.
    ///
    /// # Errors
    ///
    /// See [`ServerPort::start`].
    pub fn start(&mut self) -> Result<(), ServerError> {
        self.port.start(Arc::clone(&self.router), &self.settings)
    }

    /// Stop serving. A no-op unless the server is started.
    pub fn stop(&mut self) {
        self.port.stop();
    }

    /// The port actually bound, kept after [`stop`](Self::stop).
    #[must_use]
    pub fn runtime_port(&self) -> Option<u16> {
        self.port.runtime_port()
    }

    #[must_use]
    pub fn state(&self) -> PortState {
        self.port.state()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.port.state() == PortState::Started
    }

    #[must_use]
    pub fn adapter(&self) -> &'static str {
        self.port.name()
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.port.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::MiniHttpAdapter;

    #[test]
    fn test_stop_before_start_is_noop() {
        let router = Router::builder().build().unwrap();
        let mut server = Server::new(MiniHttpAdapter::new(), router, ServerSettings::default());
        server.stop();
        assert_eq!(server.state(), PortState::Created);
        assert_eq!(server.runtime_port(), None);
        assert_eq!(server.adapter(), "minihttp");
    }
}
