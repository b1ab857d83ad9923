/// Structured event records emitted by every core operation.
///
/// The core hands events to an injected sink and never blocks on it except
/// for critical security events (tamper, self-test failure, entropy
/// failure), which use the blocking path. A saturated sink loses the event
/// and bumps the dropped counter; the cryptographic operation itself never
/// fails because of the sink.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Security,
    Operation,
    System,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub category: EventCategory,
    pub severity: EventSeverity,
    pub kind: &'static str,
    pub details: String,
    pub actor: Option<String>,
}

impl Event {
    pub fn new(
        category: EventCategory,
        severity: EventSeverity,
        kind: &'static str,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            severity,
            kind,
            details: details.into(),
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Sink interface implemented by the embedding application. Durability is
/// the sink's responsibility; the core only emits.
pub trait EventSink: Send + Sync {
    /// Non-blocking delivery. Return false when the sink is saturated.
    fn try_send(&self, event: Event) -> bool;

    /// Blocking delivery, used for critical security events.
    fn send(&self, event: Event) {
        let _ = self.try_send(event);
    }
}

/// Bounded channel sink backed by std::sync::mpsc, for embedders that
/// consume events from another thread.
pub struct ChannelSink {
    tx: SyncSender<Event>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, Receiver<Event>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn try_send(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

/// Dispatch point between the core and the configured sink.
pub struct EventBus {
    sink: RwLock<Option<Arc<dyn EventSink>>>,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            sink: RwLock::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write().expect("event sink lock poisoned") = Some(sink);
    }

    /// Emit an event. Critical security events block until delivered;
    /// everything else is try-send with drop-on-full.
    pub fn emit(&self, event: Event) {
        let guard = self.sink.read().expect("event sink lock poisoned");
        let Some(sink) = guard.as_ref() else {
            return;
        };
        if event.category == EventCategory::Security && event.severity == EventSeverity::Critical {
            sink.send(event);
        } else if !sink.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, rx) = ChannelSink::new(4);
        let bus = EventBus::new();
        bus.set_sink(Arc::new(sink));

        bus.emit(Event::new(
            EventCategory::Operation,
            EventSeverity::Info,
            "encrypt",
            "1 frame",
        ));

        let event = rx.recv().unwrap();
        assert_eq!(event.kind, "encrypt");
        assert_eq!(event.category, EventCategory::Operation);
        assert!(event.actor.is_none());
    }

    #[test]
    fn test_saturated_sink_drops_and_counts() {
        let (sink, rx) = ChannelSink::new(1);
        let bus = EventBus::new();
        bus.set_sink(Arc::new(sink));

        for _ in 0..3 {
            bus.emit(Event::new(
                EventCategory::Operation,
                EventSeverity::Info,
                "encrypt",
                "",
            ));
        }
        assert_eq!(bus.dropped(), 2);

        // The first event is still there.
        assert_eq!(rx.recv().unwrap().kind, "encrypt");
    }

    #[test]
    fn test_no_sink_is_a_noop() {
        let bus = EventBus::new();
        bus.emit(Event::new(
            EventCategory::System,
            EventSeverity::Warning,
            "rotation_due",
            "",
        ));
        assert_eq!(bus.dropped(), 0);
    }

    #[test]
    fn test_critical_security_uses_blocking_path() {
        // Capacity 1 with an unread event would drop a try-send; the
        // blocking path must deliver once the reader drains.
        let (sink, rx) = ChannelSink::new(1);
        let bus = Arc::new(EventBus::new());
        bus.set_sink(Arc::new(sink));

        bus.emit(Event::new(
            EventCategory::Operation,
            EventSeverity::Info,
            "filler",
            "",
        ));

        let emitter = {
            let bus = Arc::clone(&bus);
            std::thread::spawn(move || {
                bus.emit(Event::new(
                    EventCategory::Security,
                    EventSeverity::Critical,
                    "auth_failure",
                    "tag mismatch",
                ));
            })
        };

        assert_eq!(rx.recv().unwrap().kind, "filler");
        assert_eq!(rx.recv().unwrap().kind, "auth_failure");
        emitter.join().unwrap();
        assert_eq!(bus.dropped(), 0);
    }

    #[test]
    fn test_with_actor() {
        let event = Event::new(
            EventCategory::Admin,
            EventSeverity::Info,
            "key_rotated",
            "version 2",
        )
        .with_actor("scheduler");
        assert_eq!(event.actor.as_deref(), Some("scheduler"));
    }
}
