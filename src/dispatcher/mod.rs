//! # Dispatcher Module
//!
//! The dispatcher sits between a server port and the router. It decodes the
//! raw request, asks the [`Router`](crate::router::Router) for a match and
//! either serves a static resource or runs a [`Handler`] with a fresh
//! [`Context`].
//!
//! ## Error Handling
//!
//! Per-request failures never leave the dispatcher:
//! - Unmatched routes and unresolved static resources return `404`
//! - Handler errors and handler panics are logged and return `500`
//! - Bodies over the configured limit return `413` without dispatching
//!
//! ## Concurrency
//!
//! A [`Dispatcher`] holds only an `Arc<Router>` and a body limit. Adapters
//! clone it into every worker thread, coroutine or task; the route table is
//! never mutated after `build()`, so no locking is involved.

mod context;
mod core;

pub use context::Context;
pub use core::{Dispatcher, Handler, HandlerResult, DEFAULT_MAX_BODY_BYTES};
