//! Form body decoding: `application/x-www-form-urlencoded` and
//! `multipart/form-data`.
//!
//! Both decoders are lenient. Broken input loses the affected entries and
//! never fails the request; a multipart body with no usable segment yields an
//! empty [`Parts`].

use crate::server::request::{Params, Part, PartData, Parts};
use thiserror::Error;
use tracing::debug;

/// Why a multipart segment was skipped. Logged, never returned to callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum MultipartError {
    #[error("segment has no header/body separator")]
    MissingHeaderEnd,
    #[error("segment has no Content-Disposition header")]
    MissingDisposition,
    #[error("Content-Disposition has no name")]
    MissingName,
}

/// Decode `a=1&b=2&a=3` into an ordered multi-map.
///
/// `+` decodes to a space and percent escapes are resolved in both keys and
/// values. Pieces without `=` map to an empty value.
#[must_use]
pub fn parse_url_encoded(body: &[u8]) -> Params {
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Extract the `boundary` parameter of a `multipart/form-data` content type.
#[must_use]
pub fn parse_boundary(content_type: &str) -> Option<String> {
    let mut pieces = split_params(content_type).into_iter();
    let mime = pieces.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    pieces
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| unquote(v).to_string())
        .filter(|b| !b.is_empty())
}

/// Split a multipart body on its boundary lines and decode every named
/// segment.
///
/// A delimiter only counts at the start of a line and when followed by `--`,
/// whitespace or a line end, so `--boundary` inside a part's content is kept
/// as data. Segments whose `Content-Disposition` carries a `filename` become
/// file parts with their raw bytes; the others are decoded as UTF-8 values.
/// Segments without a name are skipped.
#[must_use]
pub fn parse_multipart(body: &[u8], boundary: &str) -> Parts {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Parts::default();

    let first = if body.starts_with(delimiter) && closes_delimiter(&body[delimiter.len()..]) {
        Some(delimiter.len())
    } else {
        next_delimiter(body, delimiter, 0).map(|(_, after)| after)
    };
    let Some(mut start) = first else {
        debug!("Multipart body has no boundary");
        return parts;
    };

    loop {
        // `--` right after a delimiter closes the body.
        if body[start..].starts_with(b"--") {
            break;
        }
        let content_start = skip_line_end(body, start);
        let Some((content_end, after)) = next_delimiter(body, delimiter, content_start) else {
            debug!("Multipart body ends without closing boundary");
            break;
        };
        let segment = &body[content_start..content_end.max(content_start)];
        match parse_segment(segment) {
            Ok(part) => parts.insert(part),
            Err(err) => debug!(error = %err, "Skipping multipart segment"),
        }
        start = after;
    }
    parts
}

/// Next `\n--boundary` line at or after `from`.
///
/// Returns where the preceding segment's content ends (before `\r\n` or a
/// bare `\n`) and the offset just past the delimiter.
fn next_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut at = from;
    loop {
        let hit = find(body, b"\n", at)?;
        let after = hit + 1 + delimiter.len();
        if body[hit + 1..].starts_with(delimiter) && closes_delimiter(&body[after..]) {
            let end = if hit > from && body[hit - 1] == b'\r' {
                hit - 1
            } else {
                hit
            };
            return Some((end, after));
        }
        at = hit + 1;
    }
}

/// Whether the bytes following `--boundary` make it a delimiter line.
fn closes_delimiter(rest: &[u8]) -> bool {
    match rest.first() {
        None => true,
        Some(b'-') => rest.starts_with(b"--"),
        Some(c) => matches!(c, b'\r' | b'\n' | b' ' | b'\t'),
    }
}

fn parse_segment(segment: &[u8]) -> Result<Part, MultipartError> {
    let (header_len, sep_len) = find(segment, b"\r\n\r\n", 0)
        .map(|i| (i, 4))
        .or_else(|| find(segment, b"\n\n", 0).map(|i| (i, 2)))
        .ok_or(MultipartError::MissingHeaderEnd)?;
    let headers = String::from_utf8_lossy(&segment[..header_len]);
    let content = &segment[header_len + sep_len..];

    let mut disposition = None;
    let mut content_type = None;
    for line in headers.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("content-disposition") {
            disposition = Some(value.trim().to_string());
        } else if name.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }
    let disposition = disposition.ok_or(MultipartError::MissingDisposition)?;
    let name = disposition_param(&disposition, "name")
        .filter(|n| !n.is_empty())
        .ok_or(MultipartError::MissingName)?;
    let file_name = disposition_param(&disposition, "filename");

    let data = if file_name.is_some() {
        PartData::File(content.to_vec())
    } else {
        PartData::Value(String::from_utf8_lossy(content).into_owned())
    };
    Ok(Part {
        name,
        file_name,
        content_type,
        data,
    })
}

/// Value of `key` in `form-data; name="a"; filename="b.txt"`.
fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    split_params(disposition)
        .into_iter()
        .skip(1)
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| unquote(v).to_string())
}

/// Split a header value on `;`, leaving separators inside quotes alone.
fn split_params(value: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quoted = false;
    let mut begin = 0;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                pieces.push(&value[begin..i]);
                begin = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&value[begin..]);
    pieces
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn skip_line_end(body: &[u8], at: usize) -> usize {
    let padding = body[at..]
        .iter()
        .take_while(|&&c| c == b' ' || c == b'\t')
        .count();
    let at = at + padding;
    if body[at..].starts_with(b"\r\n") {
        at + 2
    } else if body[at..].starts_with(b"\n") {
        at + 1
    } else {
        at
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
