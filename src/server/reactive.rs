//! Event-loop engine: `axum` on a private `tokio` runtime.
//!
//! Every request goes through one fallback handler that buffers the body,
//! then runs the shared [`Dispatcher`] on the blocking pool so synchronous
//! handlers never stall the event loop. The adapter owns its runtime, so
//! `start` and `stop` must be called from outside any `tokio` context.

use super::port::{PortState, RuntimePort, ServerPort};
use super::request::RawRequest;
use super::response::Response;
use crate::config::ServerSettings;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::router::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use futures_util::StreamExt;
use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const ADAPTER: &str = "reactive";

struct Running {
    runtime: Runtime,
    shutdown: oneshot::Sender<()>,
    serve: JoinHandle<()>,
    timeout: Duration,
}

impl Running {
    fn stop(self) {
        let Self {
            runtime,
            shutdown,
            serve,
            timeout,
        } = self;
        if shutdown.send(()).is_err() {
            debug!(adapter = ADAPTER, "Serve task already finished");
        }
        let drained = runtime.block_on(async { tokio::time::timeout(timeout, serve).await });
        if drained.is_err() {
            warn!(
                adapter = ADAPTER,
                timeout_ms = timeout.as_millis() as u64,
                "Graceful shutdown timed out, dropping open connections"
            );
        }
        runtime.shutdown_timeout(timeout);
    }
}

/// [`ServerPort`] backed by `axum` and `tokio`.
pub struct ReactiveAdapter {
    state: PortState,
    runtime_port: RuntimePort,
    running: Option<Running>,
}

impl Default for ReactiveAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactiveAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PortState::Created,
            runtime_port: RuntimePort::new(),
            running: None,
        }
    }
}

async fn handle(State(dispatcher): State<Dispatcher>, request: Request) -> axum::response::Response {
    let (parts, body) = request.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str())
        .to_string();

    let body = match collect_body(body, dispatcher.max_body_bytes()).await {
        Ok(bytes) => bytes,
        Err(status) => {
            debug!(request_target = %target, status = status.as_u16(), "Request body rejected");
            return to_axum(Response::status_only(status));
        }
    };

    let raw = RawRequest {
        method: parts.method,
        target,
        headers: parts.headers,
        body,
    };
    match tokio::task::spawn_blocking(move || dispatcher.dispatch(raw)).await {
        Ok(response) => to_axum(response),
        Err(err) => {
            error!(adapter = ADAPTER, error = %err, "Dispatch task failed");
            to_axum(Response::status_only(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

/// Buffer at most `limit` bytes: 413 past the limit, 400 when the
/// transport fails mid-body.
async fn collect_body(body: Body, limit: usize) -> Result<Vec<u8>, StatusCode> {
    let mut chunks = body.into_data_stream();
    let mut collected = Vec::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|err| {
            debug!(adapter = ADAPTER, error = %err, "Request body read failed");
            StatusCode::BAD_REQUEST
        })?;
        if collected.len() + chunk.len() > limit {
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
        collected.extend_from_slice(&chunk);
    }
    Ok(collected)
}

fn to_axum(response: Response) -> axum::response::Response {
    let mut out = axum::response::Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    out
}

impl ServerPort for ReactiveAdapter {
    fn name(&self) -> &'static str {
        ADAPTER
    }

    fn start(&mut self, router: Arc<Router>, settings: &ServerSettings) -> Result<(), ServerError> {
        if self.state == PortState::Started {
            return Err(ServerError::AlreadyStarted(ADAPTER));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(settings.workers.max(1))
            .thread_name("routeport-reactive")
            .enable_all()
            .build()
            .map_err(|source| ServerError::Runtime {
                adapter: ADAPTER,
                source,
            })?;

        let requested = settings.socket_addr();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind(requested))
            .map_err(|source| ServerError::Bind {
                address: requested,
                source,
            })?;
        let addr = listener.local_addr().unwrap_or(requested);

        let app = axum::Router::new()
            .fallback(handle)
            .with_state(Dispatcher::new(router, settings.max_body_bytes));
        let (shutdown, signal) = oneshot::channel::<()>();
        let serve = runtime.spawn(async move {
            let graceful = axum::serve(listener, app).with_graceful_shutdown(async {
                signal.await.ok();
            });
            if let Err(err) = graceful.await {
                error!(adapter = ADAPTER, error = %err, "Serve loop failed");
            }
        });

        self.runtime_port.publish(addr.port());
        self.running = Some(Running {
            runtime,
            shutdown,
            serve,
            timeout: settings.shutdown_timeout(),
        });
        self.state = PortState::Started;
        info!(adapter = ADAPTER, address = %addr, workers = settings.workers.max(1), "Server started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.state != PortState::Started {
            return;
        }
        if let Some(running) = self.running.take() {
            running.stop();
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

impl Drop for ReactiveAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}
