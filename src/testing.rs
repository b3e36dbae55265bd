use crate::event::Event;
use crate::transport::{EventTransport, TransportError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Transport that keeps every event it receives.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    events: Mutex<Vec<Event>>,
}

impl RecordingTransport {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTransport for RecordingTransport {
    async fn send(&self, event: &Event) -> Result<(), TransportError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
