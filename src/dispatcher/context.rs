use crate::codec::Codec;
use crate::error::CodecError;
use crate::router::PathParams;
use crate::server::request::{Params, Part, Parts, Request};
use crate::server::response::Response;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Per-request dispatch state handed to a [`Handler`](super::Handler).
///
/// A `Context` owns the decoded request, the path parameters of the matched
/// route and the response being built. It lives for one dispatch and is never
/// shared between requests.
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: PathParams,
    response: Response,
}

impl Context {
    #[must_use]
    pub fn new(request: Request, params: PathParams) -> Self {
        Self {
            request,
            params,
            response: Response::default(),
        }
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn path_params(&self) -> &PathParams {
        &self.params
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Text matched by the route's trailing `*`.
    #[must_use]
    pub fn wildcard(&self) -> Option<&str> {
        self.params.wildcard()
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.request.query_parameters_values().get(name)
    }

    #[must_use]
    pub fn query_parameters_values(&self) -> &Params {
        self.request.query_parameters_values()
    }

    #[must_use]
    pub fn form_param(&self, name: &str) -> Option<&str> {
        self.request.form_parameters_values().get(name)
    }

    #[must_use]
    pub fn form_parameters_values(&self) -> &Params {
        self.request.form_parameters_values()
    }

    #[must_use]
    pub fn parts(&self) -> &Parts {
        self.request.parts()
    }

    #[must_use]
    pub fn part(&self, name: &str) -> Option<&Part> {
        self.request.parts().get(name)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Decode the request body with `codec`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the body is not a valid `T`.
    pub fn body_as<T: DeserializeOwned, C: Codec>(&self, codec: &C) -> Result<T, CodecError> {
        codec.decode(self.request.body())
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.response.status = status;
        self
    }

    pub fn header_out(&mut self, name: &str, value: &str) -> &mut Self {
        self.response.add_header(name, value);
        self
    }

    pub fn content_type(&mut self, content_type: &str) -> &mut Self {
        self.response.set_content_type(content_type);
        self
    }

    /// Set status and body. A text content type is added when the handler
    /// did not choose one.
    pub fn send(&mut self, status: StatusCode, body: impl Into<Vec<u8>>) {
        self.response.status = status;
        self.response.body = body.into();
        if self.response.content_type().is_none() {
            self.response
                .set_content_type("text/plain; charset=utf-8");
        }
    }

    pub fn ok(&mut self, body: impl Into<Vec<u8>>) {
        self.send(StatusCode::OK, body);
    }

    /// Encode `value` with `codec` as the response body.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when `value` cannot be encoded; the response is
    /// left untouched in that case.
    pub fn send_encoded<T: Serialize, C: Codec>(
        &mut self,
        codec: &C,
        status: StatusCode,
        value: &T,
    ) -> Result<(), CodecError> {
        let body = codec.encode(value)?;
        self.response.set_content_type(codec.content_type());
        self.response.status = status;
        self.response.body = body;
        Ok(())
    }

    #[must_use]
    pub fn into_response(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::server::request::RawRequest;
    use http::header::CONTENT_TYPE;
    use http::{HeaderValue, Method};
    use serde_json::{json, Value};

    fn context(target: &str, body: &[u8]) -> Context {
        let mut raw = RawRequest::new(Method::POST, target);
        raw.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        raw.body = body.to_vec();
        Context::new(Request::from_raw(raw), PathParams::default())
    }

    #[test]
    fn test_send_defaults_to_text() {
        let mut ctx = context("/x?a=1", b"");
        assert_eq!(ctx.query_param("a"), Some("1"));
        ctx.ok("hi");
        let res = ctx.into_response();
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, b"hi");
        assert_eq!(res.content_type(), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_explicit_content_type_is_kept() {
        let mut ctx = context("/x", b"");
        ctx.content_type("text/html").status(StatusCode::CREATED);
        ctx.send(StatusCode::ACCEPTED, "<p/>");
        assert_eq!(ctx.response().content_type(), Some("text/html"));
        assert_eq!(ctx.response().status, StatusCode::ACCEPTED);
    }

    #[test]
    fn test_codec_round_through_context() {
        let mut ctx = context("/x", br#"{"n":2}"#);
        let v: Value = ctx.body_as(&JsonCodec).unwrap();
        assert_eq!(v["n"], 2);
        ctx.send_encoded(&JsonCodec, StatusCode::CREATED, &json!({"n": 3}))
            .unwrap();
        let res = ctx.into_response();
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.content_type(), Some("application/json"));
        assert_eq!(res.body, br#"{"n":3}"#);
    }
}
