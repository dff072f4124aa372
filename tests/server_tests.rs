mod common;

use common::http_client::{self, get};
use common::test_server::{adapters, settings};
use routeport::dispatcher::{Context, HandlerResult};
use routeport::server::PortState;
use routeport::{Router, Server, ServerError, ServerSettings};
use std::net::TcpListener;

fn hello_router() -> Router {
    Router::builder()
        .get("/hello", |ctx: &mut Context| -> HandlerResult {
            ctx.ok("hello");
            Ok(())
        })
        .post("/echo", |ctx: &mut Context| -> HandlerResult {
            let body = ctx.request().body().to_vec();
            ctx.ok(body);
            Ok(())
        })
        .build()
        .unwrap()
}

#[test]
fn test_stop_before_start_is_noop() {
    for adapter in adapters() {
        let mut server = Server::with_port(adapter, hello_router(), settings());
        server.stop();
        server.stop();
        assert_eq!(server.state(), PortState::Created, "{}", server.adapter());
        assert_eq!(server.runtime_port(), None, "{}", server.adapter());
    }
}

#[test]
fn test_lifecycle_and_runtime_port() {
    for adapter in adapters() {
        let mut server = Server::with_port(adapter, hello_router(), settings());
        let engine = server.adapter();
        server.start().unwrap();
        assert!(server.is_started());

        let port = server.runtime_port().unwrap();
        assert_ne!(port, 0, "{engine}");
        assert_eq!(get(port, "/hello").text(), "hello", "{engine}");

        assert!(matches!(server.start(), Err(ServerError::AlreadyStarted(_))), "{engine}");

        server.stop();
        assert_eq!(server.state(), PortState::Stopped, "{engine}");
        assert_eq!(server.runtime_port(), Some(port), "{engine}");
        assert!(
            std::net::TcpStream::connect(("127.0.0.1", port)).is_err(),
            "{engine} still accepting after stop"
        );

        // restarting binds a fresh listener
        server.start().unwrap();
        let again = server.runtime_port().unwrap();
        assert_eq!(get(again, "/hello").status, 200, "{engine}");
        server.stop();
    }
}

#[test]
fn test_bind_error_when_port_taken() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    for adapter in adapters() {
        let mut server = Server::with_port(adapter, hello_router(), settings().with_port(port));
        let engine = server.adapter();
        match server.start() {
            Err(ServerError::Bind { address, source }) => {
                assert_eq!(address.port(), port, "{engine}");
                assert!(!source.to_string().is_empty(), "{engine}");
            }
            other => panic!("{engine}: expected a bind error, got {other:?}"),
        }
        assert_eq!(server.state(), PortState::Created, "{engine}");
        assert_eq!(server.runtime_port(), None, "{engine}");
    }
}

#[test]
fn test_oversized_body_is_rejected() {
    let limited = ServerSettings {
        max_body_bytes: 64,
        ..settings()
    };
    for adapter in adapters() {
        let mut server = Server::with_port(adapter, hello_router(), limited.clone());
        let engine = server.adapter();
        server.start().unwrap();
        let port = server.runtime_port().unwrap();

        let res = http_client::send(port, "POST", "/echo", &[], &[b'x'; 32]);
        assert_eq!(res.status, 200, "{engine}");
        assert_eq!(res.body.len(), 32, "{engine}");

        let res = http_client::send(port, "POST", "/echo", &[], &[b'x'; 100]);
        assert_eq!(res.status, 413, "{engine}");
        server.stop();
    }
}

#[test]
fn test_drop_releases_listener() {
    for adapter in adapters() {
        let port = {
            let mut server = Server::with_port(adapter, hello_router(), settings());
            server.start().unwrap();
            server.runtime_port().unwrap()
        };
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }
}
