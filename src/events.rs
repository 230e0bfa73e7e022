//! Typed event bus for payment lifecycle notifications.
//!
//! Instantiated once by the process root and threaded through the
//! facilitator, settler, verifier, and client engine via explicit
//! dependency injection — there is no ambient singleton, so two
//! independently-constructed clients never cross-talk.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::warn;

/// The fixed set of event names this bus carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PaymentInitiated,
    PaymentSigned,
    PaymentVerified,
    PaymentSettled,
    PaymentFailed,
    PaymentRefunded,
    StreamStarted,
    StreamChunk,
    StreamEnded,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PaymentInitiated => "payment:initiated",
            EventKind::PaymentSigned => "payment:signed",
            EventKind::PaymentVerified => "payment:verified",
            EventKind::PaymentSettled => "payment:settled",
            EventKind::PaymentFailed => "payment:failed",
            EventKind::PaymentRefunded => "payment:refunded",
            EventKind::StreamStarted => "payment:stream_started",
            EventKind::StreamChunk => "payment:stream_chunk",
            EventKind::StreamEnded => "payment:stream_ended",
        }
    }
}

/// A single emitted event: its kind plus a JSON payload for listener use.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub data: Value,
}

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

struct Subscription {
    id: u64,
    kind: Option<EventKind>,
    listener: Listener,
}

/// Bounded ring-buffer event bus. Listener panics/failures are caught and
/// logged, never propagated — a broken listener must not break payments.
/// Delivery within one `emit` call is sequential, in subscription order.
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    history: Mutex<VecDeque<Event>>,
    capacity: usize,
    next_id: Mutex<u64>,
}

/// Handle returned by [`EventBus::on`]/[`EventBus::on_all`]; drop or call
/// [`Unsubscribe::unsubscribe`] to stop receiving events.
pub struct Unsubscribe {
    id: u64,
}

impl EventBus {
    /// Creates an event bus with the default 1000-entry history buffer.
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            history: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            next_id: Mutex::new(0),
        }
    }

    /// Subscribes to a single event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Unsubscribe
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(Some(kind), listener)
    }

    /// Subscribes to every event kind.
    pub fn on_all<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(None, listener)
    }

    fn subscribe<F>(&self, kind: Option<EventKind>, listener: F) -> Unsubscribe
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut next_id = self.next_id.lock().expect("event bus id lock poisoned");
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        self.subscriptions
            .lock()
            .expect("event bus subscriptions lock poisoned")
            .push(Subscription {
                id,
                kind,
                listener: Box::new(listener),
            });
        Unsubscribe { id }
    }

    /// Removes a subscription by its handle.
    pub fn unsubscribe(&self, handle: Unsubscribe) {
        self.subscriptions
            .lock()
            .expect("event bus subscriptions lock poisoned")
            .retain(|s| s.id != handle.id);
    }

    /// Emits an event, delivering it to matching listeners in subscription
    /// order. A listener that panics is caught and logged; it does not stop
    /// delivery to the remaining listeners.
    pub fn emit(&self, kind: EventKind, data: Value) {
        let event = Event { kind, data };

        {
            let mut history = self.history.lock().expect("event bus history lock poisoned");
            if history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        let subscriptions = self
            .subscriptions
            .lock()
            .expect("event bus subscriptions lock poisoned");
        for sub in subscriptions.iter() {
            if sub.kind.is_none() || sub.kind == Some(kind) {
                let listener = std::panic::AssertUnwindSafe(&sub.listener);
                let event_ref = std::panic::AssertUnwindSafe(&event);
                if std::panic::catch_unwind(|| (listener.0)(event_ref.0)).is_err() {
                    warn!(event = kind.as_str(), "event listener panicked, continuing");
                }
            }
        }
    }

    /// Returns the most recent events, oldest first, up to the buffer size.
    pub fn history(&self) -> Vec<Event> {
        self.history
            .lock()
            .expect("event bus history lock poisoned")
            .iter()
            .cloned()
            .collect()
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
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delivers_only_to_matching_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.on(EventKind::PaymentSigned, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(EventKind::PaymentInitiated, json!({}));
        bus.emit(EventKind::PaymentSigned, json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_all_receives_every_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.on_all(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(EventKind::PaymentInitiated, json!({}));
        bus.emit(EventKind::PaymentSettled, json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let handle = bus.on_all(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(EventKind::PaymentInitiated, json!({}));
        bus.unsubscribe(handle);
        bus.emit(EventKind::PaymentInitiated, json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let bus = EventBus::with_capacity(2);
        bus.emit(EventKind::PaymentInitiated, json!({"i": 1}));
        bus.emit(EventKind::PaymentInitiated, json!({"i": 2}));
        bus.emit(EventKind::PaymentInitiated, json!({"i": 3}));
        let history = bus.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].data, json!({"i": 2}));
    }

    #[test]
    fn a_panicking_listener_does_not_stop_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.on_all(|_| panic!("boom"));
        let count_clone = Arc::clone(&count);
        bus.on_all(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(EventKind::PaymentInitiated, json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
