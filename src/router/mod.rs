//! # Router Module
//!
//! The router module matches an incoming `(method, path)` pair to at most one
//! route of an ordered, immutable route table.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Parsing route patterns into literal, `{param}` and trailing `*` segments
//! - Building the route table through [`RouterBuilder`], including nested
//!   mounts and static-content mounts
//! - Resolving requests in declaration order and extracting path parameters
//!
//! ## Architecture
//!
//! The router uses a two-phase approach:
//!
//! 1. **Declaration**: [`RouterBuilder`] appends `(method, pattern, action)`
//!    entries. Mount prefixes are concatenated with child patterns right away,
//!    so the table is always flat. `build()` freezes it into a [`Router`].
//!
//! 2. **Matching**: [`Router::resolve`] scans the table in insertion order and
//!    returns the first route whose method filter and pattern accept the
//!    request. First declared, first matched; there is no specificity ranking.
//!
//! ## Example
//!
//! ```rust
//! use routeport::dispatcher::{Context, HandlerResult};
//! use routeport::router::{Router, Target};
//! use http::Method;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::builder()
//!     .mount("/pets", |pets| {
//!         pets.get("/{id}", |ctx: &mut Context| -> HandlerResult {
//!             let id = ctx.path_param("id").unwrap_or_default().to_string();
//!             ctx.ok(id);
//!             Ok(())
//!         })
//!     })
//!     .build()?;
//!
//! let matched = router.resolve(&Method::GET, "/pets/42").expect("route");
//! assert_eq!(matched.params.get("id"), Some("42"));
//! assert!(matches!(matched.target, Target::Handler(_)));
//! assert!(router.resolve(&Method::GET, "/pets").is_none());
//! # Ok(())
//! # }
//! ```

mod builder;
mod core;
pub mod pattern;

pub use builder::RouterBuilder;
pub use core::{Action, MethodFilter, Route, RouteMatch, Router, Target};
pub use pattern::{PathParams, PathPattern, Segment};
