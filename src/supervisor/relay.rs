// src/supervisor/relay.rs

use crate::broadcast::Broadcaster;
use crate::event::Event;
use crate::process::{ProcessState, TransitionObserver};

/// Publishes `"<name> state: <from> -> <to>"` on the global event stream.
#[derive(Debug, Clone)]
pub struct EventRelay {
    events: Broadcaster<Event>,
}

impl EventRelay {
    pub fn new(events: Broadcaster<Event>) -> Self {
        Self { events }
    }
}

impl TransitionObserver for EventRelay {
    fn on_transition(&self, program: &str, from: ProcessState, to: ProcessState) {
        self.events
            .write(Event::new(format!("{program} state: {from} -> {to}")));
    }
}
