//! In-memory collaborators for collector tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gpuvm_collector::config::ScriptConfig;
use gpuvm_collector::error::{InventoryError, RemoteError};
use gpuvm_collector::inventory::Inventory;
use gpuvm_collector::probe::Prober;
use gpuvm_collector::remote::{CommandOutput, RemoteExecutor};
use gpuvm_core::types::Target;

pub fn script_config() -> ScriptConfig {
    ScriptConfig {
        name: "get_gpu_metrics_from_vm.sh".to_string(),
        local_dir: PathBuf::from("./scripts"),
        remote_dir: "/tmp".to_string(),
    }
}

pub fn targets(count: i64) -> Vec<Target> {
    (1..=count)
        .map(|id| Target::new(id, format!("kvm-{id:02}")))
        .collect()
}

/// Text the fake helper prints for `vm_id`.
pub fn helper_output(vm_id: &str) -> String {
    format!("# TYPE gpu_util gauge\ngpu_util{{gpu=\"0\"}} {vm_id}\n")
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

pub struct FakeInventory {
    result: Mutex<Result<Vec<Target>, String>>,
    calls: AtomicUsize,
}

impl FakeInventory {
    pub fn with_targets(targets: Vec<Target>) -> Self {
        Self {
            result: Mutex::new(Ok(targets)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Mutex::new(Err(message.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Inventory for FakeInventory {
    async fn list_targets(&self) -> Result<Vec<Target>, InventoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(|message| InventoryError::Query(sqlx::Error::Protocol(message)))
    }

    async fn ping(&self) -> Result<(), InventoryError> {
        match &*self.result.lock().unwrap() {
            Ok(_) => Ok(()),
            Err(message) => Err(InventoryError::Query(sqlx::Error::Protocol(message.clone()))),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote executor
// ---------------------------------------------------------------------------

/// How the fake helper behaves on a given host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostBehaviour {
    Healthy,
    NonZeroExit,
    TransportError,
    EmptyOutput,
    UploadFails,
}

#[derive(Default)]
pub struct FakeExecutor {
    installed: Mutex<HashSet<String>>,
    overrides: Mutex<Vec<(String, HostBehaviour)>>,
    delay: Duration,
    uploads: AtomicUsize,
    runs: Mutex<Vec<(String, String, Vec<String>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn behave(self, host: &str, behaviour: HostBehaviour) -> Self {
        self.overrides
            .lock()
            .unwrap()
            .push((host.to_string(), behaviour));
        self
    }

    pub fn preinstalled(self, host: &str) -> Self {
        self.installed.lock().unwrap().insert(host.to_string());
        self
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> Vec<(String, String, Vec<String>)> {
        self.runs.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn behaviour(&self, host: &str) -> HostBehaviour {
        self.overrides
            .lock()
            .unwrap()
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, b)| *b)
            .unwrap_or(HostBehaviour::Healthy)
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn file_exists(&self, host: &str, _path: &str) -> Result<bool, RemoteError> {
        Ok(self.installed.lock().unwrap().contains(host))
    }

    async fn upload_executable(
        &self,
        host: &str,
        _local: &Path,
        _remote: &str,
    ) -> Result<(), RemoteError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.behaviour(host) == HostBehaviour::UploadFails {
            return Err(RemoteError::NonZeroExit {
                operation: "upload",
                exit_code: 1,
                stderr: "scp: /tmp: Permission denied".to_string(),
            });
        }
        self.installed.lock().unwrap().insert(host.to_string());
        Ok(())
    }

    async fn run(
        &self,
        host: &str,
        program: &str,
        args: &[String],
    ) -> Result<CommandOutput, RemoteError> {
        self.runs
            .lock()
            .unwrap()
            .push((host.to_string(), program.to_string(), args.to_vec()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let vm_id = args.first().cloned().unwrap_or_default();
        let output = |stdout: String, exit_code: i32| CommandOutput {
            stdout,
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "nvidia-smi failed".to_string()
            },
            exit_code,
            duration_ms: 5,
        };

        match self.behaviour(host) {
            HostBehaviour::Healthy | HostBehaviour::UploadFails => {
                Ok(output(helper_output(&vm_id), 0))
            }
            HostBehaviour::NonZeroExit => Ok(output(String::new(), 1)),
            HostBehaviour::EmptyOutput => Ok(output("  \n".to_string(), 0)),
            HostBehaviour::TransportError => Err(RemoteError::Timeout {
                operation: "helper script",
                elapsed_ms: 30_000,
            }),
        }
    }
}

pub fn prober(executor: Arc<FakeExecutor>) -> Arc<Prober> {
    Arc::new(Prober::new(executor, script_config()))
}
