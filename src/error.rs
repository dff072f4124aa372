//! Error types shared across the router, the server ports and the codecs.
//!
//! Declaration-time failures ([`RouteError`], [`ServerError`]) are returned to
//! the caller synchronously. Per-request failures never surface here: an
//! unmatched route becomes a `404` response and a failing handler becomes a
//! `500` response inside the [`Dispatcher`](crate::dispatcher::Dispatcher).

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Raised while declaring routes, before any server is started.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The route pattern could not be parsed.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl RouteError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The backend listener could not bind its address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// `start` was called on a port that is already listening.
    #[error("{0} is already started")]
    AlreadyStarted(&'static str),

    /// The backend runtime could not be created.
    #[error("failed to start {adapter} runtime: {source}")]
    Runtime {
        adapter: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Failures converting a body to or from a typed value.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml codec error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
