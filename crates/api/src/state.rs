use std::sync::Arc;

use gpuvm_collector::dispatcher::CollectionDispatcher;
use gpuvm_core::cache::MetricsCache;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Latest reading per VM, written by the collector.
    pub cache: Arc<MetricsCache>,
    /// Collection loop, consulted for inventory health and the last cycle.
    pub dispatcher: Arc<CollectionDispatcher>,
}
