use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use tracing::warn;

/// Response built by a handler through its [`Context`](crate::dispatcher::Context),
/// then handed back to the adapter for serialization.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A plain-text response, used for the dispatcher's own error statuses.
    #[must_use]
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut res = Self::new(status);
        res.set_content_type("text/plain; charset=utf-8");
        res.body = body.into().into_bytes();
        res
    }

    /// An empty response whose body is only the canonical reason phrase.
    #[must_use]
    pub fn status_only(status: StatusCode) -> Self {
        Self::text(status, status.canonical_reason().unwrap_or_default())
    }

    /// Append a header value. Invalid names or values are dropped with a warning.
    pub fn add_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.headers.append(n, v);
            }
            _ => warn!(header = %name, "Dropping invalid response header"),
        }
    }

    /// Replace every value of a header.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.headers.insert(n, v);
            }
            _ => warn!(header = %name, "Dropping invalid response header"),
        }
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.set_header(CONTENT_TYPE.as_str(), content_type);
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Reason phrase for the status line; `"Unknown"` for unregistered codes.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown")
    }
}
