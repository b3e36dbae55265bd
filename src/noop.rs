use crate::event::Event;
use crate::transport::{EventTransport, TransportError};
use async_trait::async_trait;

/// A transport that discards every event.
///
/// Used when no DSN is configured, so that reporting is disabled without
/// the rest of the service having to know.
#[derive(Clone, Debug, Default)]
pub struct NoopTransport;

#[async_trait]
impl EventTransport for NoopTransport {
    async fn send(&self, _event: &Event) -> Result<(), TransportError> {
        Ok(())
    }
}
