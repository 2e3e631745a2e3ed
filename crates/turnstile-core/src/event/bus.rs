use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tracing::warn;

use super::Event;

/// Receiver of coordinator events.
///
/// Called synchronously on the coordinator's hot path, outside of any coordinator lock.
/// Implementations must be cheap; anything slow belongs behind a channel.
pub trait Subscribe: Send + Sync + 'static {
    fn on_event(&self, event: &Event);

    /// Stable name used when reporting a misbehaving subscriber.
    fn name(&self) -> &'static str;
}

/// Fan-out of events to a fixed set of subscribers.
#[derive(Clone, Default)]
pub struct Bus {
    subscribers: Arc<[Arc<dyn Subscribe>]>,
}

impl Bus {
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            subscribers: subscribers.into(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// A panicking subscriber is reported and skipped; the others still receive the event.
    pub fn emit(&self, event: Event) {
        for sub in self.subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| sub.on_event(&event))).is_err() {
                warn!(
                    subscriber = sub.name(),
                    kind = ?event.kind,
                    "subscriber panicked while processing an event"
                );
            }
        }
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.subscribers.iter().map(|s| s.name()).collect();
        f.debug_struct("Bus").field("subscribers", &names).finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::event::{EventKind, SOURCE_POOL};

    /// Subscriber that keeps every event it sees.
    #[derive(Default)]
    pub(crate) struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        pub(crate) fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().unwrap().iter().map(|e| e.kind).collect()
        }

        pub(crate) fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Subscribe for Recorder {
        fn on_event(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicky;

    impl Subscribe for Panicky {
        fn on_event(&self, _event: &Event) {
            panic!("boom");
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[test]
    fn emit_reaches_every_subscriber() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let bus = Bus::new(vec![a.clone(), b.clone()]);

        bus.emit(Event::new(EventKind::TaskEnqueued, SOURCE_POOL));

        assert_eq!(a.kinds(), vec![EventKind::TaskEnqueued]);
        assert_eq!(b.kinds(), vec![EventKind::TaskEnqueued]);
    }

    #[test]
    fn panicking_subscriber_does_not_starve_others() {
        let rec = Arc::new(Recorder::default());
        let bus = Bus::new(vec![Arc::new(Panicky), rec.clone()]);

        bus.emit(Event::new(EventKind::WorkerStarted, SOURCE_POOL));

        assert_eq!(rec.kinds(), vec![EventKind::WorkerStarted]);
    }

    #[test]
    fn empty_bus_is_noop() {
        let bus = Bus::default();
        assert!(bus.is_empty());
        bus.emit(Event::new(EventKind::GateAdmitted, SOURCE_POOL));
    }
}
