//! Helpers for reading typed settings from environment-style lookups.
//!
//! Config structs take a `lookup` closure instead of reading `std::env`
//! directly so they can be exercised from tests without touching process
//! state. Production code passes [`env_lookup`].

use std::str::FromStr;

use crate::error::CoreError;

/// Look up a variable in the process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Read a string setting, falling back to `default` when unset.
pub fn string_or<L>(lookup: &L, key: &str, default: &str) -> String
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Parse a setting, falling back to `default` when unset.
pub fn parse_or<T, L>(
    lookup: &L,
    key: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, CoreError>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::InvalidSetting {
                key,
                value: raw,
                expected,
            }),
    }
}

/// Read a boolean flag. Only a case-insensitive `true` enables it.
pub fn flag_or<L>(lookup: &L, key: &str, default: bool) -> bool
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
