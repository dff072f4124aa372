mod common;

use common::http_client::multipart_body;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use routeport::multipart::{parse_boundary, parse_multipart, parse_url_encoded};
use routeport::server::{PartData, RawRequest, Request};
use std::io::Read;

const BOUNDARY: &str = "----routeportFormBoundary";

fn post(target: &str, content_type: &str, body: Vec<u8>) -> Request {
    let mut raw = RawRequest::new(Method::POST, target);
    raw.headers
        .insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
    raw.body = body;
    Request::from_raw(raw)
}

#[test]
fn test_file_part_streams_exact_bytes() {
    let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let body = multipart_body(BOUNDARY, &[("file", Some("data.bin"), bytes.as_slice())]);
    let request = post(
        "/upload",
        &format!("multipart/form-data; boundary={BOUNDARY}"),
        body,
    );

    let keys: Vec<&str> = request.parts().keys().collect();
    assert_eq!(keys, vec!["file"]);
    let part = request.parts().get("file").unwrap();
    assert!(part.is_file());
    assert_eq!(part.file_name.as_deref(), Some("data.bin"));
    assert_eq!(part.content_type.as_deref(), Some("application/octet-stream"));

    let mut received = Vec::new();
    part.stream().read_to_end(&mut received).unwrap();
    assert_eq!(received, bytes);
    // file parts are not form parameters
    assert!(request.form_parameters_values().is_empty());
}

#[test]
fn test_inline_and_file_parts_together() {
    let body = multipart_body(
        BOUNDARY,
        &[
            ("title", None, "Ünïcode title".as_bytes()),
            ("attachment", Some("notes.txt"), &b"line 1\r\nline 2\r\n"[..]),
            ("tag", None, &b"rust"[..]),
        ],
    );
    let request = post(
        "/upload?source=cli",
        &format!("multipart/form-data; boundary=\"{BOUNDARY}\""),
        body,
    );

    let keys: Vec<&str> = request.parts().keys().collect();
    assert_eq!(keys, vec!["title", "attachment", "tag"]);
    assert_eq!(
        request.parts().get("title").unwrap().data,
        PartData::Value("Ünïcode title".to_string())
    );
    assert_eq!(
        request.parts().get("attachment").unwrap().bytes(),
        b"line 1\r\nline 2\r\n"
    );

    let form = request.form_parameters_values();
    assert_eq!(form.get("title"), Some("Ünïcode title"));
    assert_eq!(form.get("tag"), Some("rust"));
    assert!(!form.contains_key("attachment"));
    assert!(!form.contains_key("source"));
    assert_eq!(request.query_parameters_values().get("source"), Some("cli"));
    assert!(!request.query_parameters_values().contains_key("title"));
}

#[test]
fn test_file_containing_boundary_text_is_intact() {
    let payload = format!("diff a--{BOUNDARY}b end\r\n--{BOUNDARY}tail on a new line\r\n");
    let body = multipart_body(
        BOUNDARY,
        &[
            ("patch", Some("p.txt"), payload.as_bytes()),
            ("after", None, &b"still parsed"[..]),
        ],
    );
    let request = post(
        "/upload",
        &format!("multipart/form-data; boundary={BOUNDARY}"),
        body,
    );
    assert_eq!(request.parts().get("patch").unwrap().bytes(), payload.as_bytes());
    assert_eq!(
        request.form_parameters_values().get("after"),
        Some("still parsed")
    );
}

#[test]
fn test_malformed_segments_are_skipped() {
    let body = format!(
        "--{b}\r\nContent-Type: text/plain\r\n\r\nno disposition\r\n\
         --{b}\r\nContent-Disposition: form-data; filename=\"x.txt\"\r\n\r\nno name\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"kept\"\r\n\r\nyes\r\n\
         --{b}--\r\n",
        b = BOUNDARY
    );
    let parts = parse_multipart(body.as_bytes(), BOUNDARY);
    assert_eq!(parts.len(), 1);
    assert_eq!(parts.get("kept").unwrap().value(), Some("yes"));

    assert!(parse_multipart(b"not multipart at all", BOUNDARY).is_empty());
}

#[test]
fn test_boundary_parsing() {
    assert_eq!(
        parse_boundary("multipart/form-data; boundary=abc123").as_deref(),
        Some("abc123")
    );
    assert_eq!(
        parse_boundary("Multipart/Form-Data; charset=utf-8; boundary=\"q q\"").as_deref(),
        Some("q q")
    );
    assert_eq!(parse_boundary("multipart/form-data"), None);
    assert_eq!(parse_boundary("application/json; boundary=abc"), None);
}

#[test]
fn test_url_encoded_keeps_order_and_duplicates() {
    let params = parse_url_encoded(b"z=1&a=2&z=3&empty=&flag&sp=a+b%26c");
    let keys: Vec<&str> = params.keys().collect();
    assert_eq!(keys, vec!["z", "a", "empty", "flag", "sp"]);
    assert_eq!(params.get_all("z"), ["1", "3"]);
    assert_eq!(params.get("empty"), Some(""));
    assert_eq!(params.get("flag"), Some(""));
    assert_eq!(params.get("sp"), Some("a b&c"));
    assert!(params.get_all("missing").is_empty());
}

#[test]
fn test_query_and_form_never_mix() {
    let request = post(
        "/form?queryName=queryValue",
        "application/x-www-form-urlencoded",
        b"name=value".to_vec(),
    );
    let query = request.query_parameters_values();
    let form = request.form_parameters_values();
    assert_eq!(query.len(), 1);
    assert_eq!(query.get_all("queryName"), ["queryValue"]);
    assert_eq!(form.len(), 1);
    assert_eq!(form.get_all("name"), ["value"]);
    assert!(!query.contains_key("name"));
    assert!(!form.contains_key("queryName"));
}
