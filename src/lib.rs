//! # routeport
//!
//! **routeport** routes HTTP requests by method and path pattern, serves
//! bundled and on-disk static content, decodes url-encoded and multipart
//! bodies, and runs the same route table on any of three server engines.
//!
//! ## Overview
//!
//! - **[`router`]** - Path patterns (`/users/{id}`, `/assets/*`) and the
//!   insertion-ordered route table
//! - **[`dispatcher`]** - Handler trait, per-request [`Context`] and the
//!   backend-agnostic dispatch boundary
//! - **[`server`]** - Request/response model, the [`ServerPort`] contract, its
//!   adapters and the [`Server`] façade
//! - **[`static_files`]** - Resource roots, index fallback and content types
//! - **[`multipart`]** - `multipart/form-data` and url-encoded body parsing
//! - **[`config`]** - [`ServerSettings`] from defaults, YAML and environment
//! - **[`logging`]** - `tracing` subscriber setup and runtime level changes
//! - **[`codec`]** - JSON and YAML body codecs
//! - **[`converters`]** - Typed value conversions
//!
//! ## Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Port as ServerPort<br/>(minihttp / threaded / reactive)
//!     participant Dispatcher
//!     participant Router
//!     participant Handler
//!
//!     Client->>Port: HTTP request
//!     Port->>Dispatcher: RawRequest
//!     Dispatcher->>Dispatcher: decode path, query, form, parts
//!     Dispatcher->>Router: resolve(method, path)
//!     alt handler route
//!         Router-->>Dispatcher: handler + path params
//!         Dispatcher->>Handler: handle(&mut Context)
//!         Handler-->>Dispatcher: Ok / Err / panic
//!     else static mount
//!         Router-->>Dispatcher: Resource
//!     else no match
//!         Router-->>Dispatcher: None (404)
//!     end
//!     Dispatcher-->>Port: Response
//!     Port-->>Client: HTTP response
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use routeport::dispatcher::{Context, HandlerResult};
//! use routeport::server::MiniHttpAdapter;
//! use routeport::static_files::ResourceRoot;
//! use routeport::{Router, Server, ServerSettings};
//!
//! let router = Router::builder()
//!     .mount("/api", |api| {
//!         api.get("/hello/{name}", |ctx: &mut Context| -> HandlerResult {
//!             let name = ctx.path_param("name").unwrap_or("world").to_string();
//!             ctx.ok(format!("Hello {name}"));
//!             Ok(())
//!         })
//!     })
//!     .static_root(ResourceRoot::directory("./public"))
//!     .build()?;
//!
//! let mut server = Server::new(MiniHttpAdapter::new(), router, ServerSettings::from_env());
//! server.start()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bundle;
pub mod codec;
pub mod config;
pub mod converters;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod multipart;
pub mod router;
pub mod server;
pub mod static_files;

pub use bundle::ResourceBundle;
pub use config::ServerSettings;
pub use dispatcher::{Context, Handler, HandlerResult};
pub use error::{CodecError, RouteError, ServerError};
pub use router::{Router, RouterBuilder};
pub use server::{Server, ServerPort};
