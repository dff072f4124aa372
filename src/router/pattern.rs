//! Route path patterns.
//!
//! A pattern such as `/users/{id}/files/*` is parsed once, when the route is
//! declared, into a list of [`Segment`]s. Matching then walks the request path
//! segment by segment without allocating for literal segments.

use crate::error::RouteError;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 path params (e.g., /users/{id}/posts/{postId}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the dispatch hot path.
///
/// Param names use `Arc<str>` because they come from the frozen route table;
/// cloning them is an atomic increment instead of a string copy.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One piece of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment exactly.
    Literal(String),
    /// Matches any single non-empty segment and binds it under this name.
    Param(Arc<str>),
    /// Matches the rest of the path, including an empty rest. Always last.
    Wildcard,
}

/// Bindings produced by a successful [`PathPattern::matches`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: ParamVec,
    wildcard: Option<String>,
}

impl PathParams {
    /// Value bound to the `{name}` segment.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text captured by a trailing `*`, without a leading slash.
    #[inline]
    #[must_use]
    pub fn wildcard(&self) -> Option<&str> {
        self.wildcard.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.wildcard.is_none()
    }
}

/// A parsed route pattern. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse `pattern` into segments.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPattern`] when the pattern does not start
    /// with `/`, when `*` is not the last segment, when a `{}` parameter is
    /// unterminated or unnamed, or when a parameter name repeats.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(RouteError::invalid(pattern, "pattern must start with `/`"));
        };

        let pieces: Vec<&str> = rest.split('/').collect();
        let last = pieces.len() - 1;
        let mut segments = Vec::with_capacity(pieces.len());
        for (i, piece) in pieces.iter().enumerate() {
            let segment = if *piece == "*" {
                if i != last {
                    return Err(RouteError::invalid(
                        pattern,
                        "wildcard `*` must be the last segment",
                    ));
                }
                Segment::Wildcard
            } else if let Some(inner) = piece.strip_prefix('{') {
                let name = inner.strip_suffix('}').ok_or_else(|| {
                    RouteError::invalid(pattern, format!("unterminated parameter `{piece}`"))
                })?;
                if name.is_empty() || name.contains(['{', '}']) {
                    return Err(RouteError::invalid(
                        pattern,
                        format!("malformed parameter `{piece}`"),
                    ));
                }
                let duplicated = segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(n) if n.as_ref() == name));
                if duplicated {
                    return Err(RouteError::invalid(
                        pattern,
                        format!("parameter `{name}` declared twice"),
                    ));
                }
                Segment::Param(Arc::from(name))
            } else {
                Segment::Literal((*piece).to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern text as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }

    /// Match a decoded request path (without query string).
    ///
    /// Returns `None` when the path does not start with `/`, when a literal
    /// differs, when a parameter would bind an empty segment, or when segment
    /// counts diverge and no wildcard absorbs the rest.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        // `None` once the last request segment has been consumed; `Some("")`
        // still holds one empty segment (a trailing slash).
        let mut rest = Some(path.strip_prefix('/')?);
        let mut bindings = PathParams::default();

        for segment in &self.segments {
            match segment {
                Segment::Wildcard => {
                    bindings.wildcard = Some(rest?.to_string());
                    return Some(bindings);
                }
                Segment::Literal(text) => {
                    let (piece, tail) = split_segment(rest?);
                    if piece != text {
                        return None;
                    }
                    rest = tail;
                }
                Segment::Param(name) => {
                    let (piece, tail) = split_segment(rest?);
                    if piece.is_empty() {
                        return None;
                    }
                    bindings.params.push((Arc::clone(name), piece.to_string()));
                    rest = tail;
                }
            }
        }

        rest.is_none().then_some(bindings)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn split_segment(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('/') {
        Some((piece, tail)) => (piece, Some(tail)),
        None => (rest, None),
    }
}

/// Join a mount prefix with a child pattern at declaration time.
///
/// `join_paths("/static", "/files/*")` is `/static/files/*`; a child of `/` or
/// `""` maps to the prefix itself.
#[must_use]
pub fn join_paths(prefix: &str, child: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if child.is_empty() || child == "/" {
        return if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        };
    }
    if child.starts_with('/') {
        format!("{prefix}{child}")
    } else {
        format!("{prefix}/{child}")
    }
}
