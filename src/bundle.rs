//! Resources compiled into the binary.
//!
//! A [`ResourceBundle`] maps logical names such as `assets/index.html` to
//! bytes embedded with `include_bytes!`. It plays the role a classpath plays
//! for JVM servers: the lookup key is a name fixed at build time, never a
//! filesystem path.
//!
//! ```rust
//! use routeport::ResourceBundle;
//!
//! let bundle = ResourceBundle::new()
//!     .with("public/hello.txt", b"hello")
//!     .with("public/index.html", b"<h1>hi</h1>");
//! assert_eq!(bundle.get("public/hello.txt"), Some(&b"hello"[..]));
//! assert!(bundle.get("public/missing").is_none());
//! ```

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ResourceBundle {
    entries: HashMap<String, &'static [u8]>,
}

impl ResourceBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `bytes` under `name`, replacing any previous entry.
    #[must_use]
    pub fn with(mut self, name: &str, bytes: &'static [u8]) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: &str, bytes: &'static [u8]) {
        self.entries
            .insert(name.trim_start_matches('/').to_string(), bytes);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static [u8]> {
        self.entries.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logical names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
