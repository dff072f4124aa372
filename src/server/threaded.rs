//! Blocking engine: `tiny_http` with a fixed pool of worker threads.
//!
//! `tiny_http` owns the listener and per-connection I/O and queues parsed
//! requests; `settings.workers` threads pull from that queue and dispatch.
//! Responses on one connection are written in request order by the engine.

use super::port::{PortState, RuntimePort, ServerPort};
use super::request::RawRequest;
use super::response::Response;
use crate::config::ServerSettings;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::router::Router;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use http::{HeaderMap, Method, StatusCode};
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const ADAPTER: &str = "threaded";

struct Workers {
    addr: SocketAddr,
    server: Arc<tiny_http::Server>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl Workers {
    fn stop(self) {
        self.running.store(false, Ordering::Release);
        for _ in &self.threads {
            self.server.unblock();
        }
        for worker in self.threads {
            if worker.join().is_err() {
                debug!(adapter = ADAPTER, "Worker thread ended with a panic");
            }
        }
        // tiny_http closes the listener on its accept thread once the last
        // Arc is dropped, so wait for that before reporting Stopped
        drop(self.server);
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        warn!(adapter = ADAPTER, address = %self.addr, "Listener still accepting after stop");
    }
}

/// [`ServerPort`] backed by `tiny_http` and a worker thread pool.
pub struct ThreadedAdapter {
    state: PortState,
    runtime_port: RuntimePort,
    workers: Option<Workers>,
}

impl Default for ThreadedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadedAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PortState::Created,
            runtime_port: RuntimePort::new(),
            workers: None,
        }
    }
}

fn bind(addr: SocketAddr) -> Result<tiny_http::Server, ServerError> {
    tiny_http::Server::http(addr).map_err(|err| {
        let source = match err.downcast::<io::Error>() {
            Ok(io_err) => *io_err,
            Err(other) => io::Error::other(other.to_string()),
        };
        ServerError::Bind {
            address: addr,
            source,
        }
    })
}

fn worker_loop(server: &tiny_http::Server, running: &AtomicBool, dispatcher: &Dispatcher) {
    loop {
        match server.recv() {
            Ok(request) => serve(dispatcher, request),
            Err(err) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                warn!(adapter = ADAPTER, error = %err, "Failed to receive request");
            }
        }
    }
}

fn serve(dispatcher: &Dispatcher, mut request: tiny_http::Request) {
    let target = request.url().to_string();
    let mut headers = HeaderMap::new();
    for h in request.headers() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(h.field.as_str().as_str().as_bytes()),
            HeaderValue::from_str(h.value.as_str()),
        ) {
            headers.append(name, value);
        }
    }

    let limit = dispatcher.max_body_bytes();
    let mut body = Vec::new();
    let read = request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut body);

    let response = match (Method::from_bytes(request.method().to_string().as_bytes()), read) {
        (Ok(method), Ok(_)) => dispatcher.dispatch(RawRequest {
            method,
            target,
            headers,
            body,
        }),
        (Err(_), _) => {
            debug!(request_target = %target, "Rejecting unknown request method");
            Response::status_only(StatusCode::BAD_REQUEST)
        }
        (_, Err(err)) => {
            debug!(request_target = %target, error = %err, "Failed to read request body");
            Response::status_only(StatusCode::BAD_REQUEST)
        }
    };

    if let Err(err) = request.respond(to_tiny(response)) {
        debug!(adapter = ADAPTER, error = %err, "Client went away before the response was written");
    }
}

fn to_tiny(response: Response) -> tiny_http::Response<io::Cursor<Vec<u8>>> {
    let mut out =
        tiny_http::Response::from_data(response.body).with_status_code(response.status.as_u16());
    for (name, value) in &response.headers {
        // tiny_http computes the length from the body
        if name == CONTENT_LENGTH {
            continue;
        }
        match tiny_http::Header::from_bytes(name.as_str().as_bytes(), value.as_bytes()) {
            Ok(header) => out.add_header(header),
            Err(()) => warn!(header = %name, "Dropping header the engine cannot encode"),
        }
    }
    out
}

impl ServerPort for ThreadedAdapter {
    fn name(&self) -> &'static str {
        ADAPTER
    }

    fn start(&mut self, router: Arc<Router>, settings: &ServerSettings) -> Result<(), ServerError> {
        if self.state == PortState::Started {
            return Err(ServerError::AlreadyStarted(ADAPTER));
        }
        let requested = settings.socket_addr();
        let server = Arc::new(bind(requested)?);
        let addr = server.server_addr().to_ip().unwrap_or(requested);

        let dispatcher = Dispatcher::new(router, settings.max_body_bytes);
        let running = Arc::new(AtomicBool::new(true));
        let mut threads = Vec::with_capacity(settings.workers.max(1));
        for i in 0..settings.workers.max(1) {
            let queue = Arc::clone(&server);
            let flag = Arc::clone(&running);
            let dispatcher = dispatcher.clone();
            let spawned = thread::Builder::new()
                .name(format!("routeport-worker-{i}"))
                .spawn(move || worker_loop(&queue, &flag, &dispatcher));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(source) => {
                    Workers {
                        addr,
                        server,
                        running,
                        threads,
                    }
                    .stop();
                    return Err(ServerError::Runtime {
                        adapter: ADAPTER,
                        source,
                    });
                }
            }
        }

        self.runtime_port.publish(addr.port());
        self.workers = Some(Workers {
            addr,
            server,
            running,
            threads,
        });
        self.state = PortState::Started;
        info!(adapter = ADAPTER, address = %addr, workers = settings.workers.max(1), "Server started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.state != PortState::Started {
            return;
        }
        if let Some(workers) = self.workers.take() {
            workers.stop();
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

impl Drop for ThreadedAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_bind_error_keeps_io_kind() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        match bind(addr) {
            Err(ServerError::Bind { address, source }) => {
                assert_eq!(address, addr);
                assert_eq!(source.kind(), io::ErrorKind::AddrInUse);
            }
            other => panic!("expected bind error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_to_tiny_skips_content_length() {
        let mut res = Response::text(StatusCode::CREATED, "made");
        res.add_header("content-length", "999");
        res.add_header("x-trace", "abc");
        let out = to_tiny(res);
        assert_eq!(out.status_code().0, 201);
        assert!(out
            .headers()
            .iter()
            .all(|h| !h.field.equiv("Content-Length")));
        assert!(out.headers().iter().any(|h| h.field.equiv("x-trace")));
    }
}
