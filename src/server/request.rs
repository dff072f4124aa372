//! Request model shared by every adapter.
//!
//! Adapters only copy what their transport gives them into a [`RawRequest`];
//! [`Request::from_raw`] does all decoding (path, query string, url-encoded
//! and multipart bodies) so the result is the same whichever engine served
//! the connection.

use crate::multipart::{parse_boundary, parse_multipart, parse_url_encoded};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;

/// What an adapter read from its transport, before any decoding.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    /// Request target as sent: path plus optional `?query`.
    pub target: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawRequest {
    #[must_use]
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

/// Ordered multi-map of `name -> [values]`.
///
/// Keys keep the order they were first seen in; repeated keys append to the
/// existing value list. Lookups go through a name index, so decoding a body
/// with many distinct keys stays linear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.index.get(&name) {
            Some(&slot) => self.entries[slot].1.push(value),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, vec![value]));
            }
        }
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Every value for `name`, in arrival order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.index
            .get(name)
            .map(|&slot| self.entries[slot].1.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.append(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.append(k, v);
        }
    }
}

/// Content of a multipart entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartData {
    /// A form field, decoded as UTF-8 (lossily).
    Value(String),
    /// An uploaded file, kept as raw bytes.
    File(Vec<u8>),
}

/// One named entry of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: PartData,
}

impl Part {
    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self.data, PartData::File(_))
    }

    /// Inline value of a non-file part.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match &self.data {
            PartData::Value(v) => Some(v),
            PartData::File(_) => None,
        }
    }

    /// Raw bytes of the part, whatever its kind.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            PartData::Value(v) => v.as_bytes(),
            PartData::File(b) => b,
        }
    }

    /// A reader over the part's bytes.
    #[must_use]
    pub fn stream(&self) -> Cursor<&[u8]> {
        Cursor::new(self.bytes())
    }
}

/// Parts of a multipart body, by name, in arrival order.
///
/// A name seen twice keeps its first position and the last part's content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parts {
    parts: Vec<Part>,
    index: HashMap<String, usize>,
}

impl Parts {
    pub fn insert(&mut self, part: Part) {
        match self.index.get(&part.name) {
            Some(&slot) => self.parts[slot] = part,
            None => {
                self.index.insert(part.name.clone(), self.parts.len());
                self.parts.push(part);
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Part> {
        self.index.get(name).map(|&slot| &self.parts[slot])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl FromIterator<Part> for Parts {
    fn from_iter<I: IntoIterator<Item = Part>>(iter: I) -> Self {
        let mut parts = Self::default();
        for part in iter {
            parts.insert(part);
        }
        parts
    }
}

/// A decoded request. Immutable once built.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query_string: Option<String>,
    headers: HeaderMap,
    query: Params,
    form: Params,
    parts: Parts,
    body: Vec<u8>,
}

impl Request {
    /// Decode a raw transport request.
    ///
    /// The path is percent-decoded (left as sent when it does not decode to
    /// UTF-8). Query parameters come only from the target; form parameters
    /// only from a url-encoded or multipart body.
    #[must_use]
    pub fn from_raw(raw: RawRequest) -> Self {
        let RawRequest {
            method,
            target,
            headers,
            body,
        } = raw;

        let (raw_path, query_string) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (target.as_str(), None),
        };
        let path = match urlencoding::decode(raw_path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw_path.to_string(),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };

        let query = query_string
            .as_deref()
            .map(|q| parse_url_encoded(q.as_bytes()))
            .unwrap_or_default();

        let mut form = Params::new();
        let mut parts = Parts::default();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if !body.is_empty() {
            match mime.as_str() {
                "application/x-www-form-urlencoded" => form = parse_url_encoded(&body),
                "multipart/form-data" => match parse_boundary(content_type) {
                    Some(boundary) => {
                        parts = parse_multipart(&body, &boundary);
                        form.extend(
                            parts
                                .values()
                                .filter_map(|p| p.value().map(|v| (p.name.clone(), v.to_string()))),
                        );
                    }
                    None => debug!(content_type = %content_type, "Multipart body without boundary"),
                },
                _ => {}
            }
        }

        debug!(
            method = %method,
            path = %path,
            query_params = query.len(),
            form_params = form.len(),
            parts = parts.len(),
            body_bytes = body.len(),
            "Request decoded"
        );

        Self {
            method,
            path,
            query_string,
            headers,
            query,
            form,
            parts,
            body,
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Percent-decoded path, without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of header `name`, if it is valid visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn query_parameters_values(&self) -> &Params {
        &self.query
    }

    #[must_use]
    pub fn form_parameters_values(&self) -> &Params {
        &self.form
    }

    #[must_use]
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn raw(method: Method, target: &str, content_type: Option<&str>, body: &[u8]) -> RawRequest {
        let mut raw = RawRequest::new(method, target);
        if let Some(ct) = content_type {
            raw.headers
                .insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        }
        raw.body = body.to_vec();
        raw
    }

    #[test]
    fn test_params_keep_first_seen_order() {
        let params: Params = [("b", "1"), ("a", "2"), ("b", "3")].into_iter().collect();
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(params.get_all("b"), &["1".to_string(), "3".to_string()]);
        assert_eq!(params.get("a"), Some("2"));
        assert!(params.get_all("c").is_empty());
    }

    #[test]
    fn test_many_distinct_keys_decode_in_linear_time() {
        let body: String = (0..100_000).map(|i| format!("k{i}=&")).collect();
        let started = std::time::Instant::now();
        let req = Request::from_raw(raw(
            Method::POST,
            "/form",
            Some("application/x-www-form-urlencoded"),
            body.as_bytes(),
        ));
        assert_eq!(req.form_parameters_values().len(), 100_000);
        assert_eq!(req.form_parameters_values().get("k99999"), Some(""));
        assert_eq!(req.form_parameters_values().keys().nth(1), Some("k1"));
        assert!(
            started.elapsed() < std::time::Duration::from_secs(5),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_repeated_part_name_keeps_first_slot() {
        let part = |name: &str, value: &str| Part {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            data: PartData::Value(value.to_string()),
        };
        let parts: Parts = [part("a", "1"), part("b", "2"), part("a", "3")]
            .into_iter()
            .collect();
        assert_eq!(parts.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(parts.get("a").and_then(Part::value), Some("3"));
        assert!(parts.get("c").is_none());
    }

    #[test]
    fn test_query_and_form_stay_apart() {
        let req = Request::from_raw(raw(
            Method::POST,
            "/form?queryName=queryValue",
            Some("application/x-www-form-urlencoded"),
            b"name=value",
        ));
        let query: Params = [("queryName", "queryValue")].into_iter().collect();
        let form: Params = [("name", "value")].into_iter().collect();
        assert_eq!(req.query_parameters_values(), &query);
        assert_eq!(req.form_parameters_values(), &form);
    }

    #[test]
    fn test_path_is_decoded() {
        let req = Request::from_raw(raw(Method::GET, "/a%20b/c?x=%2F", None, b""));
        assert_eq!(req.path(), "/a b/c");
        assert_eq!(req.query_string(), Some("x=%2F"));
        assert_eq!(req.query_parameters_values().get("x"), Some("/"));
    }

    #[test]
    fn test_form_body_ignored_without_content_type() {
        let req = Request::from_raw(raw(Method::POST, "/form", None, b"name=value"));
        assert!(req.form_parameters_values().is_empty());
        assert_eq!(req.body_text(), "name=value");
    }

    #[test]
    fn test_multipart_inline_parts_are_form_params() {
        let body = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
hello\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n\
Content-Type: application/octet-stream\r\n\r\n\
\x00\x01\x02\r\n\
--XyZ--\r\n";
        let req = Request::from_raw(raw(
            Method::POST,
            "/upload?q=1",
            Some("multipart/form-data; boundary=XyZ"),
            body,
        ));
        assert_eq!(req.parts().keys().collect::<Vec<_>>(), vec!["title", "file"]);
        assert_eq!(req.form_parameters_values().get("title"), Some("hello"));
        assert!(!req.form_parameters_values().contains_key("file"));
        assert!(!req.form_parameters_values().contains_key("q"));
        let file = req.parts().get("file").unwrap();
        assert_eq!(file.bytes(), &[0u8, 1, 2]);
        assert_eq!(file.file_name.as_deref(), Some("a.bin"));
    }
}
