use crate::record::CallSite;
use serde::Serialize;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Function prefixes that never belong to application code.
const NON_APP_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "tokio::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
    "tracing_error_hook::",
    "__rust",
];

/// Frames of the capture and dispatch machinery. A synthesized trace drops
/// every leading frame from these until the first one from the code that
/// logged.
const CAPTURE_FRAMES: &[&str] = &[
    "std::",
    "core::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
    "tracing_error_hook::",
];

/// A single frame of a [`Stacktrace`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    pub in_app: bool,
}

impl Frame {
    fn from_callsite(site: &CallSite) -> Self {
        Frame {
            function: None,
            module: site.module_path.clone(),
            filename: site.file.clone(),
            lineno: site.line,
            colno: None,
            in_app: true,
        }
    }
}

/// Stack trace attached to an [`Exception`](crate::event::Exception).
///
/// Frames are ordered outermost caller first, innermost last, which is the
/// order the error-tracking service expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stacktrace {
    pub frames: Vec<Frame>,
}

impl Stacktrace {
    /// Synthesize a trace for the current execution location.
    ///
    /// Frames are empty when the binary carries no symbol information.
    pub fn capture() -> Self {
        let rendered = Backtrace::force_capture().to_string();
        let mut frames: Vec<Frame> = parse_backtrace(&rendered)
            .into_iter()
            .skip_while(|frame| is_capture_frame(frame))
            .collect();
        frames.reverse();
        Stacktrace { frames }
    }

    /// Like [`Stacktrace::capture`], but never returns an empty trace when a
    /// call site is known: the call site becomes the single frame.
    pub fn capture_or(site: Option<&CallSite>) -> Self {
        let trace = Self::capture();
        match site {
            Some(site) if trace.frames.is_empty() => Stacktrace {
                frames: vec![Frame::from_callsite(site)],
            },
            _ => trace,
        }
    }

    /// Return the trace carried by `err` or any of its sources, if one of
    /// them is a [`TracedError`].
    pub fn extract(err: &(dyn Error + 'static)) -> Option<Self> {
        std::iter::successors(Some(err), |&e| e.source())
            .find_map(|e| e.downcast_ref::<TracedError>())
            .map(|traced| traced.stacktrace.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn is_capture_frame(frame: &Frame) -> bool {
    match &frame.function {
        Some(name) => CAPTURE_FRAMES.iter().any(|p| owner(name).starts_with(p)),
        None => false,
    }
}

/// `<Type as Trait>::method` is owned by `Type`.
fn owner(function: &str) -> &str {
    function.trim_start_matches('<')
}

/// Parse the `Display` rendering of a [`Backtrace`] into frames, innermost
/// first.
fn parse_backtrace(rendered: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in rendered.lines() {
        let line = line.trim_start();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let mut parts = location.rsplitn(3, ':');
                let col = parts.next().and_then(|c| c.parse().ok());
                let lineno = parts.next().and_then(|l| l.parse().ok());
                frame.filename = parts.next().map(str::to_string).or_else(|| Some(location.to_string()));
                frame.lineno = lineno;
                frame.colno = col;
            }
            continue;
        }

        let Some((index, name)) = line.split_once(": ") else {
            continue;
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let function = strip_hash(name.trim());
        let function = (function != "<unknown>").then(|| function.to_string());
        let module = function
            .as_deref()
            .filter(|f| !f.starts_with('<'))
            .and_then(|f| f.rsplit_once("::"))
            .map(|(module, _)| module.to_string());
        let in_app = function
            .as_deref()
            .map(|f| !NON_APP_PREFIXES.iter().any(|p| owner(f).starts_with(p)))
            .unwrap_or(false);

        frames.push(Frame {
            function,
            module,
            in_app,
            ..Frame::default()
        });
    }

    frames
}

/// Drop the `::h0123456789abcdef` disambiguator legacy mangling leaves behind.
fn strip_hash(name: &str) -> &str {
    match name.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => head,
        _ => name,
    }
}

/// An error that remembers where it was created.
///
/// Wrapping an error in `TracedError` before logging it lets the hook report
/// the creation site instead of the logging site.
pub struct TracedError {
    inner: Box<dyn Error + Send + Sync>,
    stacktrace: Stacktrace,
}

impl TracedError {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        TracedError {
            inner: err.into(),
            stacktrace: Stacktrace::capture(),
        }
    }

    pub fn stacktrace(&self) -> &Stacktrace {
        &self.stacktrace
    }
}

impl fmt::Display for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedError")
            .field("inner", &self.inner)
            .field("frames", &self.stacktrace.frames.len())
            .finish()
    }
}

impl Error for TracedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }
}
