use std::sync::Arc;

use tracing_error_hook::hook::Hook;
use tracing_error_hook::noop::NoopTransport;
use tracing_error_hook::record::{EntryError, LogEntry};
use tracing_error_hook::severity::Severity;

fn is_hook_frame(function: &str) -> bool {
    function.trim_start_matches('<').starts_with("tracing_error_hook::")
}

#[tokio::test]
async fn synthesized_trace_ends_at_the_logging_code() {
    let hook = Hook::with_transport(Arc::new(NoopTransport), 16, &[]).unwrap();
    let entry = LogEntry::new(Severity::Error, "db timeout").with_error(EntryError::new("connection refused"));

    let event = hook.build_event(&entry);
    let frames = &event.exception[0].stacktrace.as_ref().unwrap().frames;
    let innermost = frames.last().expect("trace has frames");
    let function = innermost.function.as_deref().unwrap_or_default();

    assert!(
        function.starts_with("stacktrace::synthesized_trace_ends_at_the_logging_code"),
        "innermost frame is {function}"
    );
    assert!(innermost.in_app);
    assert!(frames
        .iter()
        .filter(|f| f.function.as_deref().is_some_and(is_hook_frame))
        .all(|f| !f.in_app));
}
