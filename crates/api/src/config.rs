use std::time::Duration;

use gpuvm_core::cache::DEFAULT_TTL;
use gpuvm_core::error::CoreError;
use gpuvm_core::settings::{env_lookup, parse_or, string_or};

/// Server configuration loaded from environment variables.
///
/// | Env Var                 | Default   |
/// |-------------------------|-----------|
/// | `EXPORTER_HOST`         | `0.0.0.0` |
/// | `EXPORTER_PORT`         | `9835`    |
/// | `REQUEST_TIMEOUT_SECS`  | `30`      |
/// | `SHUTDOWN_TIMEOUT_SECS` | `10`      |
/// | `CACHE_TTL`             | `30`      |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// How long to wait for the collector to stop after the server does.
    pub shutdown_timeout_secs: u64,
    /// Maximum age of a cached reading that is still served.
    pub cache_ttl: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<L>(lookup: &L) -> Result<Self, CoreError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: string_or(lookup, "EXPORTER_HOST", "0.0.0.0"),
            port: parse_or(lookup, "EXPORTER_PORT", 9835, "a port number")?,
            request_timeout_secs: parse_or(
                lookup,
                "REQUEST_TIMEOUT_SECS",
                30,
                "a whole number of seconds",
            )?,
            shutdown_timeout_secs: parse_or(
                lookup,
                "SHUTDOWN_TIMEOUT_SECS",
                10,
                "a whole number of seconds",
            )?,
            cache_ttl: Duration::from_secs(parse_or(
                lookup,
                "CACHE_TTL",
                DEFAULT_TTL.as_secs(),
                "a whole number of seconds",
            )?),
        })
    }
}
