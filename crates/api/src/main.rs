//! `gpuvm-exporter` -- GPU telemetry exporter for OpenNebula VMs.
//!
//! Periodically lists active GPU VMs from the OpenNebula database, runs a
//! helper script on each VM's host over SSH, and serves the latest readings
//! merged into one document at `GET /metrics`.
//!
//! See `ServerConfig`, `LogConfig`, `CollectorConfig` and `DbConfig` for the
//! environment variables each part reads.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gpuvm_collector::config::CollectorConfig;
use gpuvm_collector::dispatcher::CollectionDispatcher;
use gpuvm_collector::inventory::{DbInventory, Inventory};
use gpuvm_collector::probe::Prober;
use gpuvm_collector::remote::RemoteExecutor;
use gpuvm_collector::ssh::SshExecutor;
use gpuvm_core::cache::MetricsCache;
use gpuvm_core::settings::env_lookup;
use gpuvm_db::DbConfig;
use tokio_util::sync::CancellationToken;

use gpuvm_api::config::ServerConfig;
use gpuvm_api::logging::{self, LogConfig};
use gpuvm_api::router::build_app_router;
use gpuvm_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Logging ---
    let log_config = LogConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid logging configuration: {e}");
        std::process::exit(1);
    });
    if let Err(e) = logging::init(&log_config) {
        eprintln!(
            "Failed to open log file {}: {e}",
            log_config.file_path.display()
        );
        std::process::exit(1);
    }

    tracing::info!("Starting GPU VM metrics exporter");

    // --- Configuration ---
    let config = or_exit(ServerConfig::from_env(), "Invalid server configuration");
    let collector_config = or_exit(CollectorConfig::from_env(), "Invalid collector configuration");
    let db_config = or_exit(
        DbConfig::from_lookup(&env_lookup),
        "Invalid database configuration",
    );
    tracing::info!(
        host = %config.host,
        port = config.port,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        scan_interval_secs = collector_config.scan_interval.as_secs(),
        worker_pool_size = collector_config.worker_pool_size,
        "Loaded configuration",
    );

    // --- Database ---
    let connect_options = or_exit(db_config.connect_options(), "Invalid DATABASE_URL");
    let pool = gpuvm_db::create_pool(connect_options);
    tracing::info!(db_host = %db_config.host, db_name = %db_config.database, "Database pool created");

    // --- Cache + collector ---
    let cache = Arc::new(MetricsCache::new(config.cache_ttl));

    let executor: Arc<dyn RemoteExecutor> = Arc::new(SshExecutor::new(
        &collector_config.ssh,
        collector_config.probe_timeout,
    ));
    let prober = Arc::new(Prober::new(executor, collector_config.script.clone()));
    let inventory: Arc<dyn Inventory> = Arc::new(DbInventory::new(pool));

    let dispatcher = Arc::new(CollectionDispatcher::new(
        inventory,
        prober,
        Arc::clone(&cache),
        &collector_config,
    ));

    let collector_cancel = CancellationToken::new();
    let collector_handle = {
        let dispatcher = Arc::clone(&dispatcher);
        let cancel = collector_cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    };

    // --- Router ---
    let state = AppState {
        config: Arc::new(config.clone()),
        cache,
        dispatcher,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let ip = or_exit(config.host.parse(), "Invalid EXPORTER_HOST address");
    let addr = SocketAddr::new(ip, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = or_exit(
        tokio::net::TcpListener::bind(addr).await,
        "Failed to bind to address",
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping collector");

    collector_cancel.cancel();
    let wait = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(wait, collector_handle).await.is_err() {
        tracing::warn!(wait_secs = wait.as_secs(), "Collector did not stop in time");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Unwrap a startup result or log the error and exit with status 1.
fn or_exit<T, E: Display>(result: Result<T, E>, context: &str) -> T {
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "{context}");
        std::process::exit(1);
    })
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
