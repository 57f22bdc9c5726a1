use std::path::PathBuf;
use std::time::Duration;

use gpuvm_core::error::CoreError;
use gpuvm_core::settings::{parse_or, string_or};

use crate::remote::{is_safe_path, is_safe_token};

/// Default seconds slept between collection cycles.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 10;

/// Default number of concurrent probes per cycle.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// Default timeout for a single remote call (ssh or scp).
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Where the helper script lives locally and on every host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptConfig {
    /// File name of the helper, e.g. `get_gpu_metrics_from_vm.sh`.
    pub name: String,
    /// Directory the helper is uploaded from.
    pub local_dir: PathBuf,
    /// Directory the helper is installed into on each host.
    pub remote_dir: String,
}

impl ScriptConfig {
    pub fn local_path(&self) -> PathBuf {
        self.local_dir.join(&self.name)
    }

    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub user: String,
    pub key_path: PathBuf,
    pub port: u16,
}

/// Collector configuration loaded from environment variables.
///
/// | Env Var              | Default                        |
/// |----------------------|--------------------------------|
/// | `SCAN_INTERVAL`      | `10`                           |
/// | `WORKER_POOL_SIZE`   | `10`                           |
/// | `PROBE_TIMEOUT_SECS` | `30`                           |
/// | `SSH_USER`           | `user`                         |
/// | `SSH_KEY`            | `./id_rsa`                     |
/// | `SSH_PORT`           | `22`                           |
/// | `REMOTE_SCRIPT`      | `get_gpu_metrics_from_vm.sh`   |
/// | `LOCAL_SCRIPT_DIR`   | `./scripts`                    |
/// | `REMOTE_SCRIPT_DIR`  | `/tmp`                         |
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub scan_interval: Duration,
    pub worker_pool_size: usize,
    pub probe_timeout: Duration,
    pub ssh: SshConfig,
    pub script: ScriptConfig,
}

impl CollectorConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(&gpuvm_core::settings::env_lookup)
    }

    pub fn from_lookup<L>(lookup: &L) -> Result<Self, CoreError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let scan_interval_secs: u64 = parse_or(
            lookup,
            "SCAN_INTERVAL",
            DEFAULT_SCAN_INTERVAL_SECS,
            "a whole number of seconds",
        )?;
        if scan_interval_secs == 0 {
            return Err(CoreError::InvalidSetting {
                key: "SCAN_INTERVAL",
                value: "0".to_string(),
                expected: "at least 1 second",
            });
        }

        let worker_pool_size: usize = parse_or(
            lookup,
            "WORKER_POOL_SIZE",
            DEFAULT_WORKER_POOL_SIZE,
            "a positive integer",
        )?;
        if worker_pool_size == 0 {
            return Err(CoreError::InvalidSetting {
                key: "WORKER_POOL_SIZE",
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }

        let probe_timeout_secs: u64 = parse_or(
            lookup,
            "PROBE_TIMEOUT_SECS",
            DEFAULT_PROBE_TIMEOUT_SECS,
            "a whole number of seconds",
        )?;
        if probe_timeout_secs == 0 {
            return Err(CoreError::InvalidSetting {
                key: "PROBE_TIMEOUT_SECS",
                value: "0".to_string(),
                expected: "at least 1 second",
            });
        }

        let ssh = SshConfig {
            user: string_or(lookup, "SSH_USER", "user"),
            key_path: PathBuf::from(string_or(lookup, "SSH_KEY", "./id_rsa")),
            port: parse_or(lookup, "SSH_PORT", 22, "a port number")?,
        };
        if !is_safe_token(&ssh.user) {
            return Err(CoreError::Validation(format!(
                "SSH_USER '{}' contains unsupported characters",
                ssh.user
            )));
        }

        let script = ScriptConfig {
            name: string_or(lookup, "REMOTE_SCRIPT", "get_gpu_metrics_from_vm.sh"),
            local_dir: PathBuf::from(string_or(lookup, "LOCAL_SCRIPT_DIR", "./scripts")),
            remote_dir: string_or(lookup, "REMOTE_SCRIPT_DIR", "/tmp"),
        };
        if !is_safe_token(&script.name) {
            return Err(CoreError::Validation(format!(
                "REMOTE_SCRIPT '{}' must be a plain file name",
                script.name
            )));
        }
        if !is_safe_path(&script.remote_dir) {
            return Err(CoreError::Validation(format!(
                "REMOTE_SCRIPT_DIR '{}' contains unsupported characters",
                script.remote_dir
            )));
        }

        Ok(Self {
            scan_interval: Duration::from_secs(scan_interval_secs),
            worker_pool_size,
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            ssh,
            script,
        })
    }
}
