//! Request/response model, the [`ServerPort`] contract and its three engines.
//!
//! | Adapter             | Engine          | Unit of execution          |
//! |---------------------|-----------------|----------------------------|
//! | [`MiniHttpAdapter`] | `may_minihttp`  | one coroutine per connection |
//! | [`ThreadedAdapter`] | `tiny_http`     | fixed worker thread pool   |
//! | [`ReactiveAdapter`] | `axum`/`tokio`  | blocking pool per request  |

pub mod http_server;
pub mod port;
pub mod reactive;
pub mod request;
pub mod response;
#[allow(clippy::module_inception)]
pub mod server;
pub mod threaded;

pub use http_server::MiniHttpAdapter;
pub use port::{PortState, RuntimePort, ServerPort};
pub use reactive::ReactiveAdapter;
pub use request::{Params, Part, PartData, Parts, RawRequest, Request};
pub use response::Response;
pub use server::Server;
pub use threaded::ThreadedAdapter;
