use crate::severity::EventLevel;
use crate::stacktrace::Stacktrace;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Extra key under which [`Scope::apply_to_event`] records the span path.
pub const SPANS_EXTRA_KEY: &str = "spans";

/// Error record attached to an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exception {
    /// Message of the log entry that carried the error, so that events
    /// group by log site rather than by error type.
    #[serde(rename = "type")]
    pub ty: String,
    /// Textual form of the error.
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
}

/// Structured record handed to the error-tracking transport.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(serialize_with = "simple_uuid")]
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub platform: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "exception_values")]
    pub exception: Vec<Exception>,
}

impl Event {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Event {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            platform: "rust",
            message: message.into(),
            logger: None,
            transaction: None,
            extra: BTreeMap::new(),
            tags: BTreeMap::new(),
            environment: None,
            release: None,
            exception: Vec::new(),
        }
    }
}

fn simple_uuid<S: Serializer>(id: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&id.simple())
}

fn exception_values<S: Serializer>(values: &[Exception], serializer: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Values<'a> {
        values: &'a [Exception],
    }
    Values { values }.serialize(serializer)
}

/// Ambient reporting context for an event: the tracing spans that were
/// entered when the log call happened, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub spans: Vec<String>,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Attach the scope to `event` without overwriting anything the event
    /// already carries.
    pub fn apply_to_event(&self, event: &mut Event) {
        if self.spans.is_empty() {
            return;
        }
        if event.transaction.is_none() {
            event.transaction = self.spans.last().cloned();
        }
        event
            .extra
            .entry(SPANS_EXTRA_KEY.to_string())
            .or_insert_with(|| serde_json::Value::from(self.spans.clone()));
    }
}
