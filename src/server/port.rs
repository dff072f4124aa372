use crate::config::ServerSettings;
use crate::error::ServerError;
use crate::router::Router;
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// Lifecycle of a server port: `Created -> Started -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Created,
    Started,
    Stopped,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Stopped => "stopped",
        })
    }
}

/// The contract every backend adapter implements.
///
/// Adapters only translate between their transport and
/// [`RawRequest`](super::RawRequest) / [`Response`](super::Response); the
/// routing, static content and form decoding all happen in the shared
/// [`Dispatcher`](crate::dispatcher::Dispatcher).
///
/// - `start` binds the listener and moves `Created`/`Stopped` to `Started`.
///   A bind failure returns [`ServerError::Bind`] and leaves nothing bound.
///   Starting again after `stop` binds a fresh listener.
/// - `stop` releases the listener and its workers. It is a no-op unless the
///   port is `Started`.
/// - `runtime_port` reports the port actually bound, so `0` in the settings
///   resolves to the ephemeral port. It keeps its last value after `stop`.
pub trait ServerPort: Send {
    /// Short adapter name used in logs and errors.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// [`ServerError::AlreadyStarted`] when called in `Started` state,
    /// [`ServerError::Bind`] when the listener cannot bind, and
    /// [`ServerError::Runtime`] when the engine cannot spin up.
    fn start(&mut self, router: Arc<Router>, settings: &ServerSettings) -> Result<(), ServerError>;

    fn stop(&mut self);

    fn runtime_port(&self) -> Option<u16>;

    fn state(&self) -> PortState;
}

/// The bound port, published once per bind and read from any thread.
///
/// Written with `Release` after the listener is bound and read with
/// `Acquire`, so a reader that sees the port also sees the bound listener.
/// `0` means nothing was ever bound.
#[derive(Debug, Clone, Default)]
pub struct RuntimePort(Arc<AtomicU16>);

impl RuntimePort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, port: u16) {
        self.0.store(port, Ordering::Release);
    }

    #[must_use]
    pub fn get(&self) -> Option<u16> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            port => Some(port),
        }
    }
}
