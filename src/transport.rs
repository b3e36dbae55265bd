use crate::event::Event;
use async_trait::async_trait;
use std::error::Error;

/// Error produced by an [`EventTransport`].
pub type TransportError = Box<dyn Error + Send + Sync>;

/// Asynchronous destination for [`Event`]s produced by the hook.
///
/// Implementations own the wire format of the error-tracking service. The
/// hook calls `send` from the background task of a
/// [`ReportingClient`](crate::client::ReportingClient) and never awaits it
/// on a logging thread.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Deliver a single event.
    ///
    /// **Returns**
    /// - `Ok(())` if the service accepted the event.
    /// - `Err(..)` on network, serialization or status failures. The
    ///   client counts and logs the failure; the event is not retried.
    async fn send(&self, event: &Event) -> Result<(), TransportError>;

    /// Flush anything the transport buffers locally.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
