//! Environment variable helpers shared by the `from_env` constructors.

use std::str::FromStr;

/// Parse `key` from the environment, falling back to `default` when unset or malformed
pub(crate) fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse `key` from the environment, `None` when unset or malformed
pub(crate) fn parse_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
