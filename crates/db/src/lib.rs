//! Access to the OpenNebula database that lists GPU-bearing VMs.
//!
//! The pool connects lazily: an unreachable database surfaces as a failed
//! query on the collection cycle that needs it, never as a startup failure.

use std::str::FromStr;
use std::time::Duration;

use gpuvm_core::error::CoreError;
use gpuvm_core::settings::{parse_or, string_or};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::MySqlPool;

/// The inventory query runs once per cycle; a couple of connections is plenty.
const MAX_CONNECTIONS: u32 = 2;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the inventory database.
///
/// | Env Var        | Default      |
/// |----------------|--------------|
/// | `DATABASE_URL` | unset        |
/// | `DB_HOST`      | `localhost`  |
/// | `DB_PORT`      | `3306`       |
/// | `DB_NAME`      | `dbname`     |
/// | `DB_USER`      | `dbuser`     |
/// | `DB_PASSWORD`  | `dbpassword` |
///
/// `DATABASE_URL`, when set, takes precedence over the discrete variables.
#[derive(Clone)]
pub struct DbConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl DbConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, CoreError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            url: lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()),
            host: string_or(lookup, "DB_HOST", "localhost"),
            port: parse_or(lookup, "DB_PORT", 3306, "a port number")?,
            database: string_or(lookup, "DB_NAME", "dbname"),
            user: string_or(lookup, "DB_USER", "dbuser"),
            password: string_or(lookup, "DB_PASSWORD", "dbpassword"),
        })
    }

    /// Build sqlx connect options from either the URL or the discrete fields.
    pub fn connect_options(&self) -> Result<MySqlConnectOptions, sqlx::Error> {
        match &self.url {
            Some(url) => MySqlConnectOptions::from_str(url),
            None => Ok(MySqlConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .database(&self.database)
                .username(&self.user)
                .password(&self.password)),
        }
    }
}

/// Create a lazily-connecting pool.
pub fn create_pool(options: MySqlConnectOptions) -> DbPool {
    MySqlPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_lazy_with(options)
}

/// Check that the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}
