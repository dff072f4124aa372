//! Embedded engine: `may_minihttp` on `may` coroutines.
//!
//! Every connection is served by its own coroutine and requests pipelined on
//! one connection are answered in order. The engine's `Response` only takes
//! `&'static str` header lines, so header lines are interned once and reused.
//! The intern table is capped at [`MAX_INTERNED_HEADERS`] distinct lines;
//! past that, new header lines are dropped from responses with a warning.
//! Applications that echo request data into headers should use another
//! engine.

use super::port::{PortState, RuntimePort, ServerPort};
use super::request::RawRequest;
use super::response::Response;
use crate::config::ServerSettings;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::router::Router;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const ADAPTER: &str = "minihttp";

/// Distinct header lines kept for the life of the process.
pub const MAX_INTERNED_HEADERS: usize = 4096;

static HEADER_LINES: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Return a `'static` copy of `line`, allocating it only the first time.
fn intern_header(line: String) -> Option<&'static str> {
    let mut lines = HEADER_LINES.lock().unwrap_or_else(|p| p.into_inner());
    intern_into(&mut lines, line, MAX_INTERNED_HEADERS)
}

/// `None` once `lines` holds `cap` entries and `line` is not among them.
fn intern_into(lines: &mut HashSet<&'static str>, line: String, cap: usize) -> Option<&'static str> {
    if let Some(existing) = lines.get(line.as_str()) {
        return Some(existing);
    }
    if lines.len() >= cap {
        return None;
    }
    let leaked: &'static str = Box::leak(line.into_boxed_str());
    lines.insert(leaked);
    Some(leaked)
}

/// Bridges `may_minihttp` requests to the shared [`Dispatcher`].
#[derive(Clone)]
struct RouteService {
    dispatcher: Dispatcher,
}

impl HttpService for RouteService {
    fn call(&mut self, req: may_minihttp::Request, res: &mut may_minihttp::Response) -> io::Result<()> {
        let method = Method::from_bytes(req.method().as_bytes());
        let target = req.path().to_string();
        let mut headers = HeaderMap::new();
        for h in req.headers() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(h.name.as_bytes()),
                HeaderValue::from_bytes(h.value),
            ) {
                headers.append(name, value);
            }
        }

        let limit = self.dispatcher.max_body_bytes();
        let mut body = Vec::new();
        // body() consumes the request, so it is read last
        req.body()
            .take(limit as u64 + 1)
            .read_to_end(&mut body)?;

        let response = match method {
            Ok(method) => self.dispatcher.dispatch(RawRequest {
                method,
                target,
                headers,
                body,
            }),
            Err(_) => {
                debug!(request_target = %target, "Rejecting unknown request method");
                Response::status_only(StatusCode::BAD_REQUEST)
            }
        };
        write_response(res, response);
        Ok(())
    }
}

fn write_response(res: &mut may_minihttp::Response, response: Response) {
    let reason = response.reason();
    res.status_code(usize::from(response.status.as_u16()), reason);
    for (name, value) in &response.headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match intern_header(format!("{name}: {value}")) {
            Some(line) => {
                res.header(line);
            }
            None => warn!(
                adapter = ADAPTER,
                header = %name,
                limit = MAX_INTERNED_HEADERS,
                "Header table full, dropping response header"
            ),
        }
    }
    res.body_vec(response.body);
}

/// Running engine: the accept coroutine plus the address it listens on.
struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Poll the listener until it accepts connections (~250ms).
    fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    fn stop(self) {
        // SAFETY: cancelling the accept coroutine we own is how `may` stops a
        // server; the handle stays valid until the join below.
        #[allow(unsafe_code)]
        unsafe {
            self.handle.coroutine().cancel();
        }
        if self.handle.join().is_err() {
            debug!(adapter = ADAPTER, "Accept coroutine ended with a panic");
        }
    }
}

/// [`ServerPort`] backed by `may_minihttp`.
pub struct MiniHttpAdapter {
    state: PortState,
    runtime_port: RuntimePort,
    handle: Option<ServerHandle>,
}

impl Default for MiniHttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniHttpAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PortState::Created,
            runtime_port: RuntimePort::new(),
            handle: None,
        }
    }
}

/// Resolve port `0` to a concrete free port by binding a probe listener.
fn resolve_addr(requested: SocketAddr) -> Result<SocketAddr, ServerError> {
    if requested.port() != 0 {
        return Ok(requested);
    }
    let probe = TcpListener::bind(requested).map_err(|source| ServerError::Bind {
        address: requested,
        source,
    })?;
    probe.local_addr().map_err(|source| ServerError::Bind {
        address: requested,
        source,
    })
}

impl ServerPort for MiniHttpAdapter {
    fn name(&self) -> &'static str {
        ADAPTER
    }

    fn start(&mut self, router: Arc<Router>, settings: &ServerSettings) -> Result<(), ServerError> {
        if self.state == PortState::Started {
            return Err(ServerError::AlreadyStarted(ADAPTER));
        }
        may::config().set_stack_size(settings.stack_size);

        let addr = resolve_addr(settings.socket_addr())?;
        let service = RouteService {
            dispatcher: Dispatcher::new(router, settings.max_body_bytes),
        };
        // 32 headers, enough for proxy-heavy traffic
        let handle = HttpServerWithHeaders::<_, 32>(service)
            .start(addr)
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;
        let handle = ServerHandle { addr, handle };
        if let Err(err) = handle.wait_ready() {
            warn!(adapter = ADAPTER, address = %addr, error = %err, "Listener slow to accept");
        }

        self.runtime_port.publish(addr.port());
        self.handle = Some(handle);
        self.state = PortState::Started;
        info!(adapter = ADAPTER, address = %addr, "Server started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.state != PortState::Started {
            return;
        }
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
        self.state = PortState::Stopped;
        info!(adapter = ADAPTER, "Server stopped");
    }

    fn runtime_port(&self) -> Option<u16> {
        self.runtime_port.get()
    }

    fn state(&self) -> PortState {
        self.state
    }
}

impl Drop for MiniHttpAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}
