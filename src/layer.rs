use crate::client::INTERNAL_TARGET;
use crate::event::Scope;
use crate::hook::Hook;
use crate::record::{CallSite, EntryError, LogEntry, ERROR_FIELD};
use crate::severity::Severity;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Forwards `tracing` events to the hook.
///
/// Events below the hook's [`levels`](Hook::levels) are skipped before any
/// field is visited. The enclosing spans become the event's [`Scope`].
impl<S> Layer<S> for Hook
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let severity = Severity::from(*meta.level());
        if !self.is_enabled(severity) || meta.target() == INTERNAL_TARGET {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry {
            severity,
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
            error: visitor.error,
            target: Some(meta.target().to_string()),
            location: Some(CallSite {
                file: meta.file().map(|s| s.to_string()),
                line: meta.line(),
                module_path: meta.module_path().map(|s| s.to_string()),
            }),
        };

        let scope = ctx
            .event_scope(event)
            .map(|spans| Scope {
                spans: spans.from_root().map(|span| span.name().to_string()).collect(),
            })
            .filter(|scope| !scope.is_empty());

        self.fire_in_scope(&entry, scope.as_ref());
    }
}

/// Collects an event's fields into a [`LogEntry`]'s parts.
///
/// A value recorded as `dyn Error` under [`ERROR_FIELD`] becomes the
/// entry's error, with its trace if it carries one. A plain value under
/// the same name is taken as the error's text. Either way the field is
/// also kept in `fields`.
#[derive(Default)]
pub struct FieldVisitor {
    pub fields: BTreeMap<String, serde_json::Value>,
    pub message: Option<String>,
    pub error: Option<EntryError>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }

    fn record_text(&mut self, field: &Field, text: String) {
        match field.name() {
            "message" => self.message = Some(text),
            ERROR_FIELD => {
                if self.error.is_none() {
                    self.error = Some(EntryError::new(text.clone()));
                }
                self.insert(field, serde_json::Value::String(text));
            }
            _ => self.insert(field, serde_json::Value::String(text)),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if field.name() == ERROR_FIELD {
            self.error = Some(EntryError::from_error(value));
        }
        self.insert(field, serde_json::Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::EventLevel;
    use crate::stacktrace::TracedError;
    use crate::testing::RecordingTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    fn hook(levels: &[Severity]) -> (Hook, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let hook = Hook::with_transport(transport.clone(), 64, levels).unwrap();
        (hook, transport)
    }

    #[tokio::test]
    async fn only_configured_levels_are_forwarded() {
        let (hook, transport) = hook(&[Severity::Error, Severity::Fatal]);
        hook.set_prefix("api: ");
        let subscriber = Registry::default().with(hook.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("cache miss");
            let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
            tracing::error!(error = &err as &(dyn Error + 'static), "db timeout");
        });
        assert!(hook.flush(Duration::from_secs(2)).await);

        let events = transport.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, EventLevel::Error);
        assert_eq!(event.message, "api: db timeout");
        assert_eq!(event.exception.len(), 1);
        assert_eq!(event.exception[0].ty, "db timeout");
        assert_eq!(event.exception[0].value, "connection refused");
        assert_eq!(event.extra["error"], json!("connection refused"));
        assert_eq!(hook.stats().enqueued, 1);
    }

    #[tokio::test]
    async fn fields_become_extra_and_location_is_kept() {
        let (hook, transport) = hook(&[]);
        let subscriber = Registry::default().with(hook.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user_id = 42, admin = true, ratio = 0.5, "user signed in");
        });
        assert!(hook.flush(Duration::from_secs(2)).await);

        let events = transport.events();
        let event = &events[0];
        assert_eq!(event.message, "user signed in");
        assert_eq!(event.extra["user_id"], json!(42));
        assert_eq!(event.extra["admin"], json!(true));
        assert_eq!(event.extra["ratio"], json!(0.5));
        assert!(event.exception.is_empty());
        assert_eq!(event.logger.as_deref(), Some(module_path!()));
    }

    #[tokio::test]
    async fn display_error_field_is_an_exception_without_carried_trace() {
        let (hook, transport) = hook(&[Severity::Error]);
        let subscriber = Registry::default().with(hook.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(error = %"timeout after 30s", "upstream failed");
        });
        assert!(hook.flush(Duration::from_secs(2)).await);

        let events = transport.events();
        assert_eq!(events[0].exception[0].value, "timeout after 30s");
        assert!(events[0].exception[0].stacktrace.is_some());
    }

    #[tokio::test]
    async fn traced_errors_keep_their_creation_trace() {
        let (hook, transport) = hook(&[Severity::Error]);
        let subscriber = Registry::default().with(hook.clone());
        let err = TracedError::new("disk full");
        let expected = err.stacktrace().clone();

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(error = &err as &(dyn Error + 'static), "write failed");
        });
        assert!(hook.flush(Duration::from_secs(2)).await);

        assert_eq!(transport.events()[0].exception[0].stacktrace, Some(expected));
    }

    #[tokio::test]
    async fn enclosing_spans_form_the_scope() {
        let (hook, transport) = hook(&[Severity::Error]);
        let subscriber = Registry::default().with(hook.clone());

        tracing::subscriber::with_default(subscriber, || {
            let request = tracing::info_span!("request");
            let _request = request.enter();
            let checkout = tracing::info_span!("checkout");
            let _checkout = checkout.enter();
            tracing::error!("payment declined");
        });
        assert!(hook.flush(Duration::from_secs(2)).await);

        let event = &transport.events()[0];
        assert_eq!(event.transaction.as_deref(), Some("checkout"));
        assert_eq!(event.extra["spans"], json!(["request", "checkout"]));
    }

    #[tokio::test]
    async fn internal_diagnostics_are_not_forwarded() {
        let (hook, transport) = hook(&[]);
        let subscriber = Registry::default().with(hook.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: INTERNAL_TARGET, "could not deliver event");
        });
        assert!(hook.flush(Duration::from_secs(2)).await);

        assert!(transport.events().is_empty());
    }
}
