//! Logging for resource teardown.
//!
//! The containers in `multiclose_core` report what happens while they drain
//! through `tracing` events under the `multiclose_core` target:
//!
//! | Level | Message | Fields |
//! |-------|---------|--------|
//! | `WARN` | `resource failed to close` | `error` |
//! | `WARN` | `resources failed to close while dropping ...` | `error`, `failed` |
//! | `DEBUG` | `drain finished` / `drain finished with failures` | `closed`, `failed` |
//! | `TRACE` | `swept closed resources` | `swept`, `remaining` |
//!
//! [`LogConfig`] installs a subscriber whose filter is scoped to those
//! targets, and [`CloseEvents`] is a layer that records them as
//! [`CloseEvent`]s so a caller can inspect close failures after the fact.
//!
//! # Example
//!
//! ```
//! use multiclose_tracing::LogConfig;
//! use tracing::Level;
//!
//! // Close failures only, as single-line text.
//! LogConfig::new().init()?;
//!
//! // Every drain summary, plus a directive for the application itself.
//! let verbose = LogConfig::new()
//!     .with_level(Level::DEBUG)
//!     .with_directive("my_app=info");
//! # let _ = verbose;
//! # Ok::<(), tracing_subscriber::filter::ParseError>(())
//! ```

use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Target prefix of every event emitted while closing resources.
pub const CORE_TARGET: &str = "multiclose_core";

// ─────────────────────────────────────────────────────────────────────────────
// LogConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriber configuration for teardown logging.
///
/// Events under [`CORE_TARGET`] pass at the configured level (`WARN` by
/// default, which reports only close failures). Everything else passes at
/// `WARN` unless overridden with [`with_directive`](LogConfig::with_directive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    level: Level,
    directives: Vec<String>,
    json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            directives: Vec::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Creates a configuration that reports close failures only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level for teardown events.
    ///
    /// `DEBUG` adds a summary per drain, `TRACE` adds tracker sweeps.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `"my_app=debug"`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Emits JSON lines instead of compact text.
    #[must_use]
    pub fn json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    /// The level for teardown events.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Builds the filter this configuration installs.
    ///
    /// # Errors
    ///
    /// Returns the parse error of the first invalid directive.
    pub fn filter(&self) -> Result<EnvFilter, ParseError> {
        let level = self.level.as_str().to_ascii_lowercase();
        let mut filter =
            EnvFilter::new("warn").add_directive(format!("{CORE_TARGET}={level}").parse()?);
        for directive in &self.directives {
            filter = filter.add_directive(directive.parse()?);
        }
        Ok(filter)
    }

    /// Installs the global subscriber.
    ///
    /// Returns `Ok(false)` if a global subscriber was already installed, in
    /// which case the existing one is kept.
    ///
    /// # Errors
    ///
    /// Returns the parse error of the first invalid directive.
    pub fn init(&self) -> Result<bool, ParseError> {
        let filter = self.filter()?;
        let layer = tracing_subscriber::fmt::layer().with_target(true);

        let installed = if self.json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .try_init()
                .is_ok()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.compact())
                .try_init()
                .is_ok()
        };
        Ok(installed)
    }

    /// Runs `f` with a thread-local subscriber that records teardown events,
    /// returning its result with the events it produced.
    ///
    /// # Errors
    ///
    /// Returns the parse error of the first invalid directive.
    ///
    /// # Example
    ///
    /// ```
    /// use multiclose_tracing::LogConfig;
    ///
    /// let (_, events) = LogConfig::new().capture(|| {
    ///     tracing::warn!(target: "multiclose_core::drain", error = "EPIPE", "resource failed to close");
    /// })?;
    /// assert_eq!(events[0].error.as_deref(), Some("EPIPE"));
    /// # Ok::<(), tracing_subscriber::filter::ParseError>(())
    /// ```
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> Result<(R, Vec<CloseEvent>), ParseError> {
        let events = CloseEvents::new();
        let subscriber = tracing_subscriber::registry()
            .with(self.filter()?)
            .with(events.clone());
        let result = tracing::subscriber::with_default(subscriber, f);
        Ok((result, events.take()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CloseEvents
// ─────────────────────────────────────────────────────────────────────────────

/// A recorded teardown event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Event level.
    pub level: Level,
    /// Module that emitted the event, e.g. `multiclose_core::drain`.
    pub target: String,
    /// Event message.
    pub message: String,
    /// Display text of the close failure, if the event carries one.
    pub error: Option<String>,
    /// Resources closed by a drain.
    pub closed: Option<u64>,
    /// Resources that failed to close.
    pub failed: Option<u64>,
    /// Entries discarded by a tracker sweep.
    pub swept: Option<u64>,
}

impl CloseEvent {
    /// Returns `true` for a single resource's close failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.level == Level::WARN && self.error.is_some() && self.failed.is_none()
    }
}

/// Layer that records events under [`CORE_TARGET`].
///
/// Clones share the same buffer. Events from other targets are ignored.
#[derive(Clone, Default)]
pub struct CloseEvents {
    events: Arc<Mutex<Vec<CloseEvent>>>,
}

impl CloseEvents {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CloseEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns the recorded events.
    #[must_use]
    pub fn take(&self) -> Vec<CloseEvent> {
        core::mem::take(&mut *self.events.lock())
    }
}

impl fmt::Debug for CloseEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseEvents")
            .field("recorded", &self.events.lock().len())
            .finish()
    }
}

impl<S: Subscriber> Layer<S> for CloseEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with(CORE_TARGET) {
            return;
        }

        let mut fields = FieldVisitor::default();
        event.record(&mut fields);
        self.events.lock().push(CloseEvent {
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: fields.message,
            error: fields.error,
            closed: fields.closed,
            failed: fields.failed,
            swept: fields.swept,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    error: Option<String>,
    closed: Option<u64>,
    failed: Option<u64>,
    swept: Option<u64>,
}

impl Visit for FieldVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "closed" => self.closed = Some(value),
            "failed" => self.failed = Some(value),
            "swept" => self.swept = Some(value),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_owned(),
            "error" => self.error = Some(value.to_owned()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // `%error` fields arrive here with a Debug impl that prints Display.
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "error" => self.error = Some(format!("{value:?}")),
            _ => {}
        }
    }
}
