#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use gpuvm_collector::config::ScriptConfig;
use gpuvm_collector::dispatcher::CollectionDispatcher;
use gpuvm_collector::error::{InventoryError, RemoteError};
use gpuvm_collector::inventory::Inventory;
use gpuvm_collector::probe::Prober;
use gpuvm_collector::remote::{CommandOutput, RemoteExecutor};
use gpuvm_core::cache::MetricsCache;
use gpuvm_core::types::Target;
use http_body_util::BodyExt;
use tower::ServiceExt;

use gpuvm_api::config::ServerConfig;
use gpuvm_api::router::build_app_router;
use gpuvm_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults and a 30-second TTL.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        cache_ttl: Duration::from_secs(30),
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Inventory whose database is either reachable (and empty) or down.
pub struct StaticInventory {
    reachable: bool,
}

impl StaticInventory {
    pub fn reachable() -> Arc<Self> {
        Arc::new(Self { reachable: true })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self { reachable: false })
    }
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn list_targets(&self) -> Result<Vec<Target>, InventoryError> {
        if self.reachable {
            Ok(Vec::new())
        } else {
            Err(InventoryError::Query(sqlx::Error::PoolTimedOut))
        }
    }

    async fn ping(&self) -> Result<(), InventoryError> {
        if self.reachable {
            Ok(())
        } else {
            Err(InventoryError::Query(sqlx::Error::PoolTimedOut))
        }
    }
}

/// Executor that is never expected to be called by HTTP tests.
pub struct UnusedExecutor;

#[async_trait]
impl RemoteExecutor for UnusedExecutor {
    async fn file_exists(&self, _host: &str, _path: &str) -> Result<bool, RemoteError> {
        Ok(true)
    }

    async fn upload_executable(
        &self,
        _host: &str,
        _local: &Path,
        _remote: &str,
    ) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn run(
        &self,
        _host: &str,
        _program: &str,
        _args: &[String],
    ) -> Result<CommandOutput, RemoteError> {
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Build the application router around `cache` and `inventory`.
///
/// Uses the same [`build_app_router`] as `main.rs`, so the middleware
/// stack under test is the production one.
pub fn build_test_app(cache: Arc<MetricsCache>, inventory: Arc<dyn Inventory>) -> Router {
    let config = test_config();
    let prober = Arc::new(Prober::new(
        Arc::new(UnusedExecutor),
        ScriptConfig {
            name: "get_gpu_metrics_from_vm.sh".to_string(),
            local_dir: PathBuf::from("./scripts"),
            remote_dir: "/tmp".to_string(),
        },
    ));
    let dispatcher = Arc::new(CollectionDispatcher::with_settings(
        inventory,
        prober,
        Arc::clone(&cache),
        Duration::from_secs(10),
        4,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        cache,
        dispatcher,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
