use turnstile_core::{Event, Subscribe};

use crate::subscriber::view::log_event;

/// Subscriber that writes every coordinator event to the `tracing` log.
#[derive(Debug, Default)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for Journal {
    fn on_event(&self, event: &Event) {
        log_event(event);
    }
    fn name(&self) -> &'static str {
        "journal"
    }
}
