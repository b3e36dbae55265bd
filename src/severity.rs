use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Importance of a log entry, most severe first.
///
/// `tracing` itself stops at `ERROR`; `Panic` and `Fatal` are produced by
/// the panic hook and by callers building [`LogEntry`](crate::record::LogEntry)
/// values directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Severity {
    pub const ALL: [Severity; 7] = [
        Severity::Panic,
        Severity::Fatal,
        Severity::Error,
        Severity::Warn,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Panic => "panic",
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::TRACE => Severity::Trace,
        }
    }
}

/// Error returned when a severity name is not recognised.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown severity: {0:?}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Ok(Severity::Panic),
            "fatal" => Ok(Severity::Fatal),
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Parse a comma separated list such as `"panic,fatal,error"`.
///
/// Empty input yields an empty list, which the hook treats as "all levels".
pub fn parse_levels(list: &str) -> Result<Vec<Severity>, ParseSeverityError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Severity::from_str)
        .collect()
}

/// Severity vocabulary of the error-tracking service.
///
/// `Error` is the default and is what anything without a known severity
/// reports as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Fatal,
    #[default]
    Error,
    Warning,
    Info,
    Debug,
}

impl EventLevel {
    /// Level for a free-form severity name, falling back to [`EventLevel::Error`].
    pub fn from_name(name: &str) -> Self {
        name.parse::<Severity>().map(EventLevel::from).unwrap_or_default()
    }
}

impl From<Severity> for EventLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Panic | Severity::Fatal => EventLevel::Fatal,
            Severity::Error => EventLevel::Error,
            Severity::Warn => EventLevel::Warning,
            Severity::Info => EventLevel::Info,
            Severity::Debug | Severity::Trace => EventLevel::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_severities_collapse_to_fatal() {
        assert_eq!(EventLevel::from(Severity::Panic), EventLevel::Fatal);
        assert_eq!(EventLevel::from(Severity::Fatal), EventLevel::Fatal);
    }

    #[test]
    fn trace_collapses_to_debug() {
        assert_eq!(EventLevel::from(Severity::Trace), EventLevel::Debug);
        assert_eq!(EventLevel::from(Severity::Debug), EventLevel::Debug);
        assert_eq!(EventLevel::from(Severity::Warn), EventLevel::Warning);
    }

    #[test]
    fn unknown_names_report_as_error() {
        assert_eq!(EventLevel::from_name("critical"), EventLevel::Error);
        assert_eq!(EventLevel::from_name("INFO"), EventLevel::Info);
        assert_eq!(EventLevel::default(), EventLevel::Error);
    }

    #[test]
    fn tracing_levels_map_one_to_one() {
        assert_eq!(Severity::from(tracing::Level::ERROR), Severity::Error);
        assert_eq!(Severity::from(tracing::Level::WARN), Severity::Warn);
        assert_eq!(Severity::from(tracing::Level::TRACE), Severity::Trace);
    }

    #[test]
    fn parses_level_lists() {
        assert_eq!(
            parse_levels("panic, Fatal,error").unwrap(),
            vec![Severity::Panic, Severity::Fatal, Severity::Error]
        );
        assert!(parse_levels("").unwrap().is_empty());
        assert_eq!(
            parse_levels("error,loud"),
            Err(ParseSeverityError("loud".to_string()))
        );
    }

    #[test]
    fn event_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EventLevel::Warning).unwrap(), "\"warning\"");
    }
}
