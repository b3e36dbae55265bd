use crate::dsn::ClientConstructionError;
use crate::event::{Event, Scope};
use crate::transport::EventTransport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Target used for the client's own diagnostics.
///
/// The hook ignores events on this target, so a failing transport cannot
/// feed its failures back into itself.
pub const INTERNAL_TARGET: &str = "tracing_error_hook::internal";

/// Outcome of handing an event to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for background delivery.
    Enqueued,
    /// Discarded because the queue was full or the delivery task is gone.
    Dropped,
}

/// Point-in-time copy of the client's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

enum Command {
    Capture(Box<Event>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background task that delivers events to an
/// [`EventTransport`].
///
/// Capturing never blocks: events go through a bounded channel and are
/// dropped when it is full. Cloning the client shares the same queue.
#[derive(Clone)]
pub struct ReportingClient {
    sender: mpsc::Sender<Command>,
    counters: Arc<Counters>,
}

impl ReportingClient {
    /// Spawn the delivery task on the current tokio runtime.
    ///
    /// `capacity` is raised to at least 16 to avoid degenerate queues.
    pub fn spawn(
        transport: Arc<dyn EventTransport>,
        capacity: usize,
    ) -> Result<(Self, JoinHandle<()>), ClientConstructionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientConstructionError::NoRuntime)?;

        let (tx, rx) = mpsc::channel::<Command>(capacity.max(16));
        let counters = Arc::new(Counters::default());
        let handle = runtime.spawn(deliver(transport, rx, Arc::clone(&counters)));

        Ok((Self { sender: tx, counters }, handle))
    }

    /// Queue `event` for delivery, attaching `scope` first.
    pub fn capture_event(&self, mut event: Event, scope: Option<&Scope>) -> Delivery {
        if let Some(scope) = scope {
            scope.apply_to_event(&mut event);
        }

        match self.sender.try_send(Command::Capture(Box::new(event))) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Delivery::Enqueued
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Delivery::Dropped
            }
        }
    }

    /// Wait until every event captured before this call has been handed to
    /// the transport and the transport has flushed.
    ///
    /// Returns `false` if that did not happen within `timeout`.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        let wait = async {
            self.sender.send(Command::Flush(ack_tx)).await.ok()?;
            ack_rx.await.ok()
        };
        matches!(tokio::time::timeout(timeout, wait).await, Ok(Some(())))
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn deliver(
    transport: Arc<dyn EventTransport>,
    mut rx: mpsc::Receiver<Command>,
    counters: Arc<Counters>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Capture(event) => match transport.send(&event).await {
                Ok(()) => {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        target: INTERNAL_TARGET,
                        event_id = %event.event_id,
                        error = %e,
                        "could not deliver event"
                    );
                }
            },
            Command::Flush(ack) => {
                if let Err(e) = transport.flush().await {
                    tracing::warn!(target: INTERNAL_TARGET, error = %e, "transport flush failed");
                }
                // The waiter may have timed out already.
                let _ = ack.send(());
            }
        }
    }
}
