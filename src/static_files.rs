use crate::bundle::ResourceBundle;
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.html";

/// Where a static mount finds its resources.
#[derive(Clone)]
pub enum ResourceRoot {
    /// Resources embedded in a [`ResourceBundle`], below the logical `root`
    /// (e.g. `assets`).
    Bundled {
        bundle: Arc<ResourceBundle>,
        root: String,
    },
    /// A directory read at request time.
    Directory(PathBuf),
}

impl ResourceRoot {
    #[must_use]
    pub fn bundled(bundle: impl Into<Arc<ResourceBundle>>, root: &str) -> Self {
        Self::Bundled {
            bundle: bundle.into(),
            root: root.trim_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn directory<P: Into<PathBuf>>(dir: P) -> Self {
        Self::Directory(dir.into())
    }
}

impl fmt::Debug for ResourceRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundled { root, bundle } => f
                .debug_struct("Bundled")
                .field("root", root)
                .field("entries", &bundle.len())
                .finish(),
            Self::Directory(dir) => f.debug_tuple("Directory").field(dir).finish(),
        }
    }
}

/// A resolved static resource, ready to be written as a response body.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Bundle name or filesystem path the bytes came from.
    pub name: String,
    pub content_type: &'static str,
    pub body: Cow<'static, [u8]>,
}

/// Static content served under a wildcard route.
#[derive(Debug, Clone)]
pub struct StaticMount {
    root: ResourceRoot,
}

impl StaticMount {
    #[must_use]
    pub fn new(root: ResourceRoot) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &ResourceRoot {
        &self.root
    }

    /// Look up the resource for a wildcard `suffix`.
    ///
    /// An empty suffix, or one ending in `/`, names a directory and is looked
    /// up as `suffix + "index.html"`. Suffixes that try to leave the root
    /// (`..`, absolute components) resolve to nothing. A suffix naming a
    /// child of a regular file (`file.txt/`) resolves to nothing as well.
    #[must_use]
    pub fn resolve(&self, suffix: &str) -> Option<Resource> {
        let wanted = if suffix.is_empty() || suffix.ends_with('/') {
            Cow::Owned(format!("{suffix}{INDEX_FILE}"))
        } else {
            Cow::Borrowed(suffix)
        };
        let relative = map_path(&wanted)?;

        match &self.root {
            ResourceRoot::Bundled { bundle, root } => {
                let name = bundle_name(root, &relative);
                let bytes = bundle.get(&name)?;
                Some(Resource {
                    content_type: content_type(Path::new(&name)),
                    name,
                    body: Cow::Borrowed(bytes),
                })
            }
            ResourceRoot::Directory(dir) => {
                let path = dir.join(&relative);
                if !path.is_file() {
                    return None;
                }
                match fs::read(&path) {
                    Ok(bytes) => Some(Resource {
                        content_type: content_type(&path),
                        name: path.display().to_string(),
                        body: Cow::Owned(bytes),
                    }),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "Failed to read static file");
                        None
                    }
                }
            }
        }
    }
}

/// Turn a URL suffix into a relative path, rejecting anything but plain names.
fn map_path(url_path: &str) -> Option<PathBuf> {
    let mut pb = PathBuf::new();
    for piece in url_path.split('/') {
        // `\` would be a separator on Windows; never let it through.
        if piece.contains('\\') {
            debug!(path = %url_path, "Rejected static path with backslash");
            return None;
        }
        match Path::new(piece).components().next() {
            None => {}
            Some(Component::Normal(s)) if Path::new(piece).components().count() == 1 => {
                pb.push(s)
            }
            Some(Component::CurDir) => {}
            Some(_) => {
                debug!(path = %url_path, "Rejected static path outside its root");
                return None;
            }
        }
    }
    Some(pb)
}

fn bundle_name(root: &str, relative: &Path) -> String {
    let tail = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/");
    if root.is_empty() {
        tail
    } else {
        format!("{root}/{tail}")
    }
}

/// Infer the content type from the file extension.
#[must_use]
pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
