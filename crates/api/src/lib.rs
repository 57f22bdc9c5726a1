//! GPU VM exporter HTTP service library.
//!
//! Exposes config, logging setup, shared state, and the router builder so
//! integration tests and the binary entrypoint build the exact same app.

pub mod config;
pub mod logging;
pub mod router;
pub mod routes;
pub mod state;
