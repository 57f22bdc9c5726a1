//! Probing a single VM: make sure the helper script is installed on the
//! VM's host, then run it with the VM id and keep its stdout.

use std::sync::Arc;

use gpuvm_core::types::Target;

use crate::config::ScriptConfig;
use crate::error::{ProbeError, RemoteError};
use crate::remote::RemoteExecutor;

pub struct Prober {
    executor: Arc<dyn RemoteExecutor>,
    script: ScriptConfig,
}

impl Prober {
    pub fn new(executor: Arc<dyn RemoteExecutor>, script: ScriptConfig) -> Self {
        Self { executor, script }
    }

    /// Install the helper on `host` unless it is already there.
    pub async fn ensure_script(&self, host: &str) -> Result<(), RemoteError> {
        let remote_path = self.script.remote_path();

        if self.executor.file_exists(host, &remote_path).await? {
            tracing::debug!(host, path = %remote_path, "Helper script already present");
            return Ok(());
        }

        tracing::info!(host, path = %remote_path, "Uploading helper script");
        self.executor
            .upload_executable(host, &self.script.local_path(), &remote_path)
            .await
    }

    /// Collect the exposition text for one VM.
    pub async fn probe(&self, target: &Target) -> Result<String, ProbeError> {
        let host = target.host.as_str();

        self.ensure_script(host)
            .await
            .map_err(|source| ProbeError::Bootstrap {
                host: host.to_string(),
                source,
            })?;

        tracing::debug!(vm_id = target.vm_id, host, "Collecting metrics");

        let output = self
            .executor
            .run(host, &self.script.remote_path(), &[target.vm_id.to_string()])
            .await
            .map_err(|source| ProbeError::Execution {
                host: host.to_string(),
                source,
            })?;

        if !output.success() {
            return Err(ProbeError::Execution {
                host: host.to_string(),
                source: RemoteError::NonZeroExit {
                    operation: "helper script",
                    exit_code: output.exit_code,
                    stderr: output.stderr.trim().to_string(),
                },
            });
        }

        if output.stdout.trim().is_empty() {
            return Err(ProbeError::EmptyOutput {
                host: host.to_string(),
            });
        }

        Ok(output.stdout)
    }
}
