//! In-memory log capture for tests.
//!
//! Lets a test assert that a code path logged, for example, that a malformed
//! frame was dropped or a refresh failed, without scraping stderr.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Severity.
    pub level: Level,
    /// Module path that emitted it.
    pub target: String,
    /// Rendered `message` field.
    pub message: String,
    /// Remaining structured fields, rendered as text.
    pub fields: BTreeMap<String, String>,
}

/// Shared handle to recorded events.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    /// Snapshot of every event so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Whether an event at `level` has a message containing `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    /// Whether some event recorded `name` with exactly `value`.
    pub fn has_field(&self, name: &str, value: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.fields.get(name).is_some_and(|v| v == value))
    }

    /// Number of events at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.events.lock().iter().filter(|e| e.level == level).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[derive(Default)]
struct Fields {
    message: String,
    rest: BTreeMap<String, String>,
}

impl Fields {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            let _ = self.rest.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct Recorder(CapturedLogs);

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        let meta = event.metadata();
        self.0.events.lock().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: fields.message,
            fields: fields.rest,
        });
    }
}

/// Record every event on the current thread until the guard drops.
///
/// Spawned tasks only log here when they run on the same thread, so pair this
/// with the default `current_thread` test runtime.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(Recorder(logs.clone()))
        .set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_message_and_level() {
        let (logs, _guard) = capture_logs();
        tracing::warn!("dropping malformed frame");
        assert!(logs.has_event(Level::WARN, "malformed"));
        assert!(!logs.has_event(Level::ERROR, "malformed"));
    }

    #[test]
    fn records_structured_fields() {
        let (logs, _guard) = capture_logs();
        tracing::info!(room_id = 5_i64, sub_id = "sub-1", "subscribed to room");
        assert!(logs.has_field("room_id", "5"));
        assert!(logs.has_field("sub_id", "sub-1"));
        let event = &logs.events()[0];
        assert_eq!(event.message, "subscribed to room");
    }

    #[test]
    fn counts_and_clears() {
        let (logs, _guard) = capture_logs();
        tracing::error!("a");
        tracing::error!("b");
        tracing::debug!("c");
        assert_eq!(logs.count_at_level(Level::ERROR), 2);
        logs.clear();
        assert!(logs.events().is_empty());
    }
}
