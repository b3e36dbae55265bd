use crate::hook::Hook;
use crate::record::{CallSite, EntryError, LogEntry};
use crate::severity::Severity;
use std::any::Any;
use std::panic::{self, Location};

/// Install a panic hook that reports panics through `hook`.
///
/// Panics are only reported when `Severity::Panic` is among the hook's
/// levels. The previously installed panic hook runs afterwards, so the
/// usual stderr output is kept.
pub fn install_panic_hook(hook: Hook) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if hook.is_enabled(Severity::Panic) {
            hook.fire(&panic_entry(info.payload(), info.location()));
        }
        previous(info);
    }));
}

fn panic_entry(payload: &(dyn Any + Send), location: Option<&Location<'_>>) -> LogEntry {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Box<dyn Any>".to_string());

    let thread = std::thread::current();
    let mut entry = LogEntry::new(Severity::Panic, message.clone())
        .with_field("thread", thread.name().unwrap_or("<unnamed>"))
        .with_error(EntryError::new(message));

    if let Some(location) = location {
        entry = entry.with_location(CallSite {
            file: Some(location.file().to_string()),
            line: Some(location.line()),
            module_path: None,
        });
    }
    entry
}
