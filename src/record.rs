use crate::severity::Severity;
use crate::stacktrace::Stacktrace;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;

/// Field name under which a log call attaches its error value.
pub const ERROR_FIELD: &str = "error";

/// Source location of a log call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub module_path: Option<String>,
}

/// Error value embedded in a [`LogEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryError {
    /// Textual form of the error.
    pub message: String,
    /// Trace carried by the error itself, if it had one.
    pub stacktrace: Option<Stacktrace>,
}

impl EntryError {
    pub fn new(message: impl Into<String>) -> Self {
        EntryError {
            message: message.into(),
            stacktrace: None,
        }
    }

    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        EntryError {
            message: err.to_string(),
            stacktrace: Stacktrace::extract(err),
        }
    }
}

/// One entry emitted by the logging stream.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub error: Option<EntryError>,
    pub target: Option<String>,
    pub location: Option<CallSite>,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        LogEntry {
            severity,
            message: message.into(),
            fields: BTreeMap::new(),
            error: None,
            target: None,
            location: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: EntryError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_location(mut self, location: CallSite) -> Self {
        self.location = Some(location);
        self
    }
}
