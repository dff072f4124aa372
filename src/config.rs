//! # Server Settings
//!
//! Listener and runtime settings shared by every server port.
//!
//! Settings come from three places, in increasing order of precedence:
//! built-in defaults, a YAML file ([`ServerSettings::from_yaml_file`]) and
//! environment variables ([`ServerSettings::with_env_overrides`]).
//!
//! ## Environment Variables
//!
//! | Variable                         | Field                 | Default     |
//! |----------------------------------|-----------------------|-------------|
//! | `ROUTEPORT_BIND_ADDRESS`         | `bind_address`        | `127.0.0.1` |
//! | `ROUTEPORT_PORT`                 | `port`                | `2010`      |
//! | `ROUTEPORT_MAX_BODY_BYTES`       | `max_body_bytes`      | 10 MiB      |
//! | `ROUTEPORT_WORKERS`              | `workers`             | `8`         |
//! | `ROUTEPORT_STACK_SIZE`           | `stack_size`          | `0x4000`    |
//! | `ROUTEPORT_SHUTDOWN_TIMEOUT_MS`  | `shutdown_timeout_ms` | `5000`      |
//!
//! `ROUTEPORT_STACK_SIZE` accepts decimal (`16384`) or hexadecimal (`0x4000`).
//! It sizes the coroutine stacks of the `may` runtime; values that fail to
//! parse keep the previous value.
//!
//! ```rust
//! use routeport::config::ServerSettings;
//!
//! let settings = ServerSettings::from_yaml_str("port: 0\nworkers: 2\n").unwrap();
//! assert_eq!(settings.port, 0);
//! assert_eq!(settings.workers, 2);
//! assert_eq!(settings.stack_size, 0x4000);
//! ```

use crate::dispatcher::DEFAULT_MAX_BODY_BYTES;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Settings a [`ServerPort`](crate::server::ServerPort) reads at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub bind_address: IpAddr,
    /// `0` asks the OS for an ephemeral port.
    pub port: u16,
    pub max_body_bytes: usize,
    /// Worker threads of the threaded and reactive engines.
    pub workers: usize,
    /// Coroutine stack size of the embedded engine, in bytes.
    pub stack_size: usize,
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 2010,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            workers: 8,
            stack_size: 0x4000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl ServerSettings {
    /// Defaults overridden by the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply any `ROUTEPORT_*` variable that is set and parses.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        override_from_env("ROUTEPORT_BIND_ADDRESS", &mut self.bind_address, str::parse);
        override_from_env("ROUTEPORT_PORT", &mut self.port, str::parse);
        override_from_env("ROUTEPORT_MAX_BODY_BYTES", &mut self.max_body_bytes, str::parse);
        override_from_env("ROUTEPORT_WORKERS", &mut self.workers, str::parse);
        override_from_env("ROUTEPORT_STACK_SIZE", &mut self.stack_size, parse_size);
        override_from_env(
            "ROUTEPORT_SHUTDOWN_TIMEOUT_MS",
            &mut self.shutdown_timeout_ms,
            str::parse,
        );
        self
    }

    /// # Errors
    ///
    /// Returns an error for malformed YAML or unknown fields.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse server settings")
    }

    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn override_from_env<T, E>(var: &str, slot: &mut T, parse: impl Fn(&str) -> Result<T, E>) {
    let Ok(raw) = env::var(var) else {
        return;
    };
    match parse(raw.trim()) {
        Ok(value) => *slot = value,
        Err(_) => warn!(variable = %var, value = %raw, "Ignoring unparseable setting"),
    }
}

/// Parse `16384` or `0x4000`.
fn parse_size(raw: &str) -> Result<usize, std::num::ParseIntError> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => raw.parse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("0x4000").unwrap(), 16384);
        assert_eq!(parse_size("0X10").unwrap(), 16);
        assert_eq!(parse_size("32768").unwrap(), 32768);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let s = ServerSettings::from_yaml_str("bind_address: 0.0.0.0\nport: 8080\n").unwrap();
        assert_eq!(s.socket_addr(), "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(s.workers, ServerSettings::default().workers);
    }

    #[test]
    fn test_yaml_rejects_unknown_fields() {
        assert!(ServerSettings::from_yaml_str("prot: 80\n").is_err());
        assert!(ServerSettings::from_yaml_str("port: [\n").is_err());
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_body_bytes: 1024\nshutdown_timeout_ms: 250").unwrap();
        let s = ServerSettings::from_yaml_file(file.path()).unwrap();
        assert_eq!(s.max_body_bytes, 1024);
        assert_eq!(s.shutdown_timeout(), Duration::from_millis(250));
        assert!(ServerSettings::from_yaml_file("/definitely/not/here.yaml").is_err());
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("ROUTEPORT_WORKERS", "3");
        env::set_var("ROUTEPORT_STACK_SIZE", "0x8000");
        env::set_var("ROUTEPORT_SHUTDOWN_TIMEOUT_MS", "not-a-number");
        let s = ServerSettings::default().with_env_overrides();
        env::remove_var("ROUTEPORT_WORKERS");
        env::remove_var("ROUTEPORT_STACK_SIZE");
        env::remove_var("ROUTEPORT_SHUTDOWN_TIMEOUT_MS");

        assert_eq!(s.workers, 3);
        assert_eq!(s.stack_size, 0x8000);
        assert_eq!(s.shutdown_timeout_ms, 5_000);
    }
}
