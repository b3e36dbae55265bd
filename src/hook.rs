use crate::client::{ClientStats, Delivery, ReportingClient};
use crate::dsn::{make_transport, ClientConstructionError, TransportConfig};
use crate::event::{Event, Exception, Scope};
use crate::record::LogEntry;
use crate::severity::{EventLevel, Severity};
use crate::stacktrace::Stacktrace;
use crate::transport::EventTransport;
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Metadata the hook stamps on every event.
///
/// The hook never mutates a `HookConfig` in place: mutators build a new
/// value and swap it in, so every event sees one consistent snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookConfig {
    pub tags: BTreeMap<String, String>,
    pub release: Option<String>,
    pub environment: Option<String>,
    /// Prepended to every forwarded message.
    pub prefix: String,
}

/// Bridges log entries into the error-tracking service.
///
/// A `Hook` is registered as a `tracing_subscriber` layer (see
/// [`crate::layer`]) and forwards every entry whose severity is in
/// [`Hook::levels`]. Clones share levels, metadata and delivery queue, so a
/// clone kept by the application can adjust tags while the registered copy
/// is firing on other threads.
#[derive(Clone)]
pub struct Hook {
    client: ReportingClient,
    levels: Arc<[Severity]>,
    config: Arc<ArcSwap<HookConfig>>,
}

impl Hook {
    /// Build the transport described by `config` and a hook forwarding
    /// `levels`. No levels means all of them.
    ///
    /// Environment and release from `config` seed the hook metadata.
    /// Must be called from within a tokio runtime.
    pub fn new(config: &TransportConfig, levels: &[Severity]) -> Result<Self, ClientConstructionError> {
        let transport = make_transport(config)?;
        let hook = Self::with_transport(transport, config.queue_capacity, levels)?;
        hook.config.store(Arc::new(HookConfig {
            release: config.release.clone(),
            environment: config.environment.clone(),
            ..HookConfig::default()
        }));
        Ok(hook)
    }

    /// Build a hook on top of an already constructed transport.
    pub fn with_transport(
        transport: Arc<dyn EventTransport>,
        queue_capacity: usize,
        levels: &[Severity],
    ) -> Result<Self, ClientConstructionError> {
        let (client, _delivery) = ReportingClient::spawn(transport, queue_capacity)?;
        let levels: Arc<[Severity]> = if levels.is_empty() {
            Arc::from(&Severity::ALL[..])
        } else {
            Arc::from(levels)
        };

        Ok(Hook {
            client,
            levels,
            config: Arc::new(ArcSwap::from_pointee(HookConfig::default())),
        })
    }

    /// Severities this hook wants to be notified for.
    pub fn levels(&self) -> &[Severity] {
        &self.levels
    }

    pub fn is_enabled(&self, severity: Severity) -> bool {
        self.levels.contains(&severity)
    }

    /// Forward `entry`. Never blocks and never fails the logging call:
    /// delivery problems only show up in [`Hook::stats`].
    pub fn fire(&self, entry: &LogEntry) -> Delivery {
        self.fire_in_scope(entry, None)
    }

    pub fn fire_in_scope(&self, entry: &LogEntry, scope: Option<&Scope>) -> Delivery {
        let event = self.build_event(entry);
        self.client.capture_event(event, scope)
    }

    /// Turn `entry` into the event [`Hook::fire`] would send.
    pub fn build_event(&self, entry: &LogEntry) -> Event {
        let config = self.config.load();

        let mut event = Event::new(
            EventLevel::from(entry.severity),
            format!("{}{}", config.prefix, entry.message),
        );

        if let Some(error) = &entry.error {
            let stacktrace = error
                .stacktrace
                .clone()
                .unwrap_or_else(|| Stacktrace::capture_or(entry.location.as_ref()));
            event.exception.push(Exception {
                ty: entry.message.clone(),
                value: error.message.clone(),
                stacktrace: Some(stacktrace),
            });
        }

        event.logger = entry.target.clone();
        event.extra = entry.fields.clone();
        event.tags = config.tags.clone();
        event.environment = config.environment.clone();
        event.release = config.release.clone();
        event
    }

    /// Current metadata snapshot.
    pub fn config(&self) -> Arc<HookConfig> {
        self.config.load_full()
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        self.update(|config| config.prefix = prefix.clone());
    }

    pub fn add_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.update(|config| {
            config.tags.insert(key.clone(), value.clone());
        });
    }

    pub fn set_release(&self, release: impl Into<String>) {
        let release = release.into();
        self.update(|config| config.release = Some(release.clone()));
    }

    pub fn set_environment(&self, environment: impl Into<String>) {
        let environment = environment.into();
        self.update(|config| config.environment = Some(environment.clone()));
    }

    // `rcu` retries `f` when another writer swapped in between, so
    // concurrent mutators never lose each other's changes.
    fn update<F>(&self, f: F)
    where
        F: Fn(&mut HookConfig),
    {
        self.config.rcu(|current| {
            let mut next = HookConfig::clone(current);
            f(&mut next);
            next
        });
    }

    /// Wait for queued events to reach the transport.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.client.flush(timeout).await
    }

    pub fn stats(&self) -> ClientStats {
        self.client.stats()
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("levels", &self.levels)
            .field("config", &self.config.load_full())
            .field("stats", &self.client.stats())
            .finish()
    }
}
