//! Structured logging setup and runtime level control.
//!
//! Everything in the crate logs through `tracing` macros. Binaries call
//! [`init_logging`] once at startup; it installs an `EnvFilter` behind a
//! reload layer plus a JSON or pretty `fmt` layer, and returns a
//! [`LoggingManager`] that can change levels while the server runs.
//!
//! | Variable                      | Meaning                                      | Default |
//! |-------------------------------|----------------------------------------------|---------|
//! | `ROUTEPORT_LOG_LEVEL`         | root level (`trace` .. `error`, `off`)       | `info`  |
//! | `ROUTEPORT_LOG_FORMAT`        | `json` or `pretty`                           | `json`  |
//! | `ROUTEPORT_LOG_TARGET_FILTER` | extra directives, e.g. `routeport::router=debug` | none |
//!
//! [`Logger`] is a lightweight named logger whose messages are closures,
//! only evaluated when the level is enabled. Its events carry the
//! [`LOGGER_TARGET`] target and the logger name as a field; levels set on the
//! manager for a logger name (or a `.`/`::` separated parent of it) apply to
//! that logger.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

/// Target of every event emitted through a [`Logger`].
pub const LOGGER_TARGET: &str = "routeport::logger";

/// Output format of the `fmt` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Anything but `pretty` selects JSON.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            _ => Self::Json,
        }
    }
}

/// Levels understood by [`LoggingManager`] and [`Logger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoggingLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LoggingLevel {
    #[must_use]
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for LoggingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

impl FromStr for LoggingLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "off" => Ok(Self::Off),
            other => anyhow::bail!("unknown logging level `{other}`"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LoggingLevel,
    pub format: LogFormat,
    /// Comma-separated `target=level` directives.
    pub target_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LoggingLevel::Info,
            format: LogFormat::Json,
            target_filter: None,
        }
    }
}

impl LogConfig {
    /// Read `ROUTEPORT_LOG_*` variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            level: env::var("ROUTEPORT_LOG_LEVEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(LoggingLevel::Info),
            format: LogFormat::parse(
                &env::var("ROUTEPORT_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            target_filter: env::var("ROUTEPORT_LOG_TARGET_FILTER").ok(),
        }
    }

    /// Debug level, pretty output.
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            level: LoggingLevel::Debug,
            format: LogFormat::Pretty,
            target_filter: None,
        }
    }
}

/// Directives applied on top of the root level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FilterState {
    root: Option<LoggingLevel>,
    targets: BTreeMap<String, LoggingLevel>,
}

impl FilterState {
    fn from_config(config: &LogConfig) -> Self {
        let mut state = Self {
            root: Some(config.level),
            targets: BTreeMap::new(),
        };
        // engine connection noise
        state
            .targets
            .insert("may_minihttp".to_string(), LoggingLevel::Warn);
        // named loggers are gated by `LoggerLevels`
        state
            .targets
            .insert(LOGGER_TARGET.to_string(), LoggingLevel::Trace);
        if let Some(filter) = &config.target_filter {
            for piece in filter.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match piece.split_once('=') {
                    Some((target, level)) => match level.parse() {
                        Ok(level) => {
                            state.targets.insert(target.trim().to_string(), level);
                        }
                        Err(_) => eprintln!("Warning: Invalid log filter directive: {piece}"),
                    },
                    None => eprintln!("Warning: Invalid log filter directive: {piece}"),
                }
            }
        }
        state
    }

    fn directives(&self) -> String {
        let root = self.root.unwrap_or(LoggingLevel::Info);
        std::iter::once(root.as_directive().to_string())
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    fn to_filter(&self) -> EnvFilter {
        EnvFilter::new(self.directives())
    }

    fn logger_levels(&self) -> LoggerLevels {
        LoggerLevels {
            root: self.root,
            names: self
                .targets
                .iter()
                .filter(|(name, _)| name.as_str() != LOGGER_TARGET)
                .map(|(name, level)| (name.clone(), *level))
                .collect(),
        }
    }
}

/// Thresholds for [`Logger`] names, mirrored from the manager's state.
#[derive(Debug, Default)]
struct LoggerLevels {
    root: Option<LoggingLevel>,
    names: HashMap<String, LoggingLevel>,
}

impl LoggerLevels {
    /// Level set for `name` or its closest parent, else the root level.
    fn threshold(&self, name: &str) -> Option<LoggingLevel> {
        let mut scope = name;
        loop {
            if let Some(level) = self.names.get(scope) {
                return Some(*level);
            }
            match scope.rfind(['.', ':']) {
                Some(i) => scope = scope[..i].trim_end_matches(':'),
                None => return self.root,
            }
        }
    }

    /// With no level configured anywhere the subscriber alone decides.
    fn admits(&self, name: &str, level: LoggingLevel) -> bool {
        level != LoggingLevel::Off && self.threshold(name).is_none_or(|t| level >= t)
    }
}

static LOGGER_LEVELS: Lazy<RwLock<LoggerLevels>> = Lazy::new(|| RwLock::new(LoggerLevels::default()));

fn publish_logger_levels(state: &FilterState) {
    *LOGGER_LEVELS.write().unwrap_or_else(|p| p.into_inner()) = state.logger_levels();
}

/// Runtime control over the installed filter.
///
/// Returned by [`init_logging`]. One instance per process; it is created at
/// startup and passed to whoever needs to change levels.
pub struct LoggingManager {
    handle: reload::Handle<EnvFilter, Registry>,
    state: Mutex<FilterState>,
}

impl fmt::Debug for LoggingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingManager").finish_non_exhaustive()
    }
}

impl LoggingManager {
    /// Set the level of one target: a module path such as
    /// `routeport::router` for `tracing` events, or a [`Logger`] name (which
    /// also covers loggers named below it, e.g. `billing` covers
    /// `billing.invoices`). An empty target sets the root level.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber owning the filter is gone.
    pub fn set_logger_level(&self, target: &str, level: LoggingLevel) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if target.is_empty() {
            state.root = Some(level);
        } else {
            state.targets.insert(target.to_string(), level);
        }
        self.handle
            .reload(state.to_filter())
            .context("Failed to reload log filter")?;
        publish_logger_levels(&state);
        debug!(target_name = %target, level = %level, "Logger level changed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the subscriber owning the filter is gone.
    pub fn set_root_level(&self, level: LoggingLevel) -> Result<()> {
        self.set_logger_level("", level)
    }

    /// The directive string currently in effect.
    #[must_use]
    pub fn current_directives(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .directives()
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// ```no_run
/// use routeport::logging::{init_logging, LogConfig, LoggingLevel};
///
/// let manager = init_logging(&LogConfig::from_env()).expect("logging");
/// manager.set_logger_level("routeport::router", LoggingLevel::Trace).ok();
/// ```
pub fn init_logging(config: &LogConfig) -> Result<LoggingManager> {
    let state = FilterState::from_config(config);
    let (filter_layer, handle) = reload::Layer::new(state.to_filter());

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .boxed(),
    };

    publish_logger_levels(&state);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LoggingManager {
        handle,
        state: Mutex::new(state),
    })
}

/// A named logger taking lazily evaluated messages.
///
/// ```rust
/// use routeport::logging::{Logger, LoggingLevel};
///
/// let logger = Logger::new("billing");
/// logger.debug(|| format!("expensive {}", 42));
/// logger.log(LoggingLevel::Off, || "never evaluated");
/// assert_eq!(logger.name(), "billing");
/// ```
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
}

impl Logger {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// A logger named after `T`'s type path.
    #[must_use]
    pub fn for_type<T: ?Sized>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log `message()` at `level`. The closure runs only when `level` is enabled.
    pub fn log<M, F>(&self, level: LoggingLevel, message: F)
    where
        M: fmt::Display,
        F: FnOnce() -> M,
    {
        let admitted = LOGGER_LEVELS
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .admits(&self.name, level);
        if !admitted {
            return;
        }
        match level {
            LoggingLevel::Trace if tracing::enabled!(target: LOGGER_TARGET, Level::TRACE) => {
                trace!(target: LOGGER_TARGET, logger = %self.name, "{}", message());
            }
            LoggingLevel::Debug if tracing::enabled!(target: LOGGER_TARGET, Level::DEBUG) => {
                debug!(target: LOGGER_TARGET, logger = %self.name, "{}", message());
            }
            LoggingLevel::Info if tracing::enabled!(target: LOGGER_TARGET, Level::INFO) => {
                info!(target: LOGGER_TARGET, logger = %self.name, "{}", message());
            }
            LoggingLevel::Warn if tracing::enabled!(target: LOGGER_TARGET, Level::WARN) => {
                warn!(target: LOGGER_TARGET, logger = %self.name, "{}", message());
            }
            LoggingLevel::Error if tracing::enabled!(target: LOGGER_TARGET, Level::ERROR) => {
                error!(target: LOGGER_TARGET, logger = %self.name, "{}", message());
            }
            _ => {}
        }
    }

    /// Log `message(err)` with the error attached as a field.
    pub fn log_error<E, M, F>(&self, level: LoggingLevel, err: &E, message: F)
    where
        E: std::error::Error + ?Sized,
        M: fmt::Display,
        F: FnOnce(&E) -> M,
    {
        self.log(level, || format!("{}: {err}", message(err)));
    }

    pub fn trace<M: fmt::Display>(&self, message: impl FnOnce() -> M) {
        self.log(LoggingLevel::Trace, message);
    }

    pub fn debug<M: fmt::Display>(&self, message: impl FnOnce() -> M) {
        self.log(LoggingLevel::Debug, message);
    }

    pub fn info<M: fmt::Display>(&self, message: impl FnOnce() -> M) {
        self.log(LoggingLevel::Info, message);
    }

    pub fn warn<M: fmt::Display>(&self, message: impl FnOnce() -> M) {
        self.log(LoggingLevel::Warn, message);
    }

    pub fn error<M: fmt::Display>(&self, message: impl FnOnce() -> M) {
        self.log(LoggingLevel::Error, message);
    }

    /// Run `block` and log how long it took at trace level.
    pub fn time<T>(&self, label: &str, block: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = block();
        let elapsed = start.elapsed();
        self.trace(|| format!("{label} took {elapsed:?}"));
        result
    }
}
