#![forbid(unsafe_code)]

//! Log setup and capture for tests.
//!
//! `rawterm-core` is built with its `tracing` feature here, so session
//! lifecycle events reach whatever subscriber a test installs.
//!
//! - [`init_test_logging`] / [`init_json_logging`]: process-wide fmt
//!   subscriber writing through the test harness' captured stdout, filtered
//!   by `RAWTERM_LOG` (env-filter syntax).
//! - [`capture_logs`]: run a closure under a thread-local subscriber that
//!   records every event for later assertions.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Environment variable holding the test log filter.
pub const LOG_ENV: &str = "RAWTERM_LOG";

const DEFAULT_FILTER: &str = "rawterm_core=debug,rawterm_tty=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a human-readable subscriber. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(env_filter())
        .try_init();
}

/// Install a JSON-lines subscriber (one object per event). Safe to call from
/// every test; the first installer wins.
pub fn init_json_logging() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_test_writer()
        .with_env_filter(env_filter())
        .try_init();
}

// ============================================================================
// Capture
// ============================================================================

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Value of field `name`, if recorded.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }
}

/// A `tracing_subscriber` layer that stores every event it sees.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events at exactly `level` whose message contains `needle`.
    #[must_use]
    pub fn matching(&self, level: Level, needle: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level && e.message.contains(needle))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        !self.matching(level, needle).is_empty()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let meta = event.metadata();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *meta.level(),
                target: meta.target().to_string(),
                message: visitor.message,
                fields: visitor.fields,
            });
    }
}

/// Run `f` with a capturing subscriber installed on this thread.
///
/// Events emitted on other threads (the reader, a notification thread) are
/// not captured.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, LogCapture) {
    let capture = LogCapture::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, capture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_level_message_and_fields() {
        let ((), logs) = capture_logs(|| {
            tracing::warn!(device = "fake-tty", attempts = 3u64, "restore failed");
            tracing::debug!("noise");
        });
        let warns = logs.matching(Level::WARN, "restore failed");
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].field("device"), Some("fake-tty"));
        assert_eq!(warns[0].field("attempts"), Some("3"));
        assert!(logs.contains(Level::DEBUG, "noise"));
    }

    #[test]
    fn init_is_idempotent() {
        init_test_logging();
        init_test_logging();
        init_json_logging();
    }
}
