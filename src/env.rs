//! Environment variable names read by the service bootstrap.
//!
//! These are purely helpers; the hook and the lifecycle never read the
//! environment themselves.

/// Endpoint identifier of the error-tracking service. Empty disables reporting.
pub const ERROR_HOOK_DSN_ENV: &str = "ERROR_HOOK_DSN";

/// Deployment environment name, e.g. `staging`.
pub const ERROR_HOOK_ENVIRONMENT_ENV: &str = "ERROR_HOOK_ENVIRONMENT";

/// Release identifier stamped on every event.
pub const ERROR_HOOK_RELEASE_ENV: &str = "ERROR_HOOK_RELEASE";

/// Set to `1`/`true` to log outgoing payloads.
pub const ERROR_HOOK_DEBUG_ENV: &str = "ERROR_HOOK_DEBUG";

/// Comma separated severities to forward, e.g. `panic,fatal,error`.
pub const ERROR_HOOK_LEVELS_ENV: &str = "ERROR_HOOK_LEVELS";

/// Address the HTTP listener binds to.
pub const LISTEN_ADDR_ENV: &str = "LISTEN_ADDR";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and empty alike.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read a boolean flag; `1`, `true`, `yes` and `on` count as set.
pub fn env_flag(key: &str) -> bool {
    env_opt(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_flags_and_optional_values() {
        std::env::set_var("ERROR_HOOK_TEST_FLAG", "TRUE");
        std::env::set_var("ERROR_HOOK_TEST_EMPTY", "  ");

        assert!(env_flag("ERROR_HOOK_TEST_FLAG"));
        assert!(!env_flag("ERROR_HOOK_TEST_UNSET"));
        assert_eq!(env_opt("ERROR_HOOK_TEST_EMPTY"), None);
        assert_eq!(env_or("ERROR_HOOK_TEST_UNSET", "staging"), "staging");
    }
}
