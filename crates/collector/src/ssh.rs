//! [`RemoteExecutor`] backed by the system `ssh` and `scp` binaries.
//!
//! Every call spawns a child process with `kill_on_drop(true)` and is
//! bounded by the configured timeout; when the timeout fires (or the probe
//! future is dropped on shutdown) the child is killed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::config::SshConfig;
use crate::error::RemoteError;
use crate::remote::{ensure, is_safe_host, is_safe_path, is_safe_token, CommandOutput, RemoteExecutor};

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

pub struct SshExecutor {
    user: String,
    key_path: PathBuf,
    port: u16,
    timeout: Duration,
}

impl SshExecutor {
    pub fn new(config: &SshConfig, timeout: Duration) -> Self {
        Self {
            user: config.user.clone(),
            key_path: config.key_path.clone(),
            port: config.port,
            timeout,
        }
    }

    /// Options shared by `ssh` and `scp`. The port flag differs (`-p` vs `-P`).
    fn common_args(&self, port_flag: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_path.display().to_string(),
            port_flag.to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.timeout.as_secs().max(1)),
        ]
    }

    fn destination(&self, host: &str) -> Result<String, RemoteError> {
        ensure(is_safe_host(host), "host", host)?;
        Ok(format!("{}@{}", self.user, host))
    }

    /// Run `remote_command` on `host` through `ssh`.
    async fn ssh(
        &self,
        host: &str,
        remote_command: &str,
        operation: &'static str,
    ) -> Result<CommandOutput, RemoteError> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.common_args("-p"))
            .arg(self.destination(host)?)
            .arg("--")
            .arg(remote_command);

        tracing::trace!(host, operation, "Running remote command");
        run_with_timeout(&mut cmd, "ssh", operation, self.timeout).await
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn file_exists(&self, host: &str, path: &str) -> Result<bool, RemoteError> {
        ensure(is_safe_path(path), "path", path)?;
        let output = self
            .ssh(host, &format!("test -f {path}"), "file check")
            .await?;
        // `test` exits 1 for "no such file"; 255 is ssh's own failure code.
        match output.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            exit_code => Err(RemoteError::NonZeroExit {
                operation: "file check",
                exit_code,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }

    async fn upload_executable(
        &self,
        host: &str,
        local: &Path,
        remote: &str,
    ) -> Result<(), RemoteError> {
        ensure(is_safe_path(remote), "path", remote)?;
        if !tokio::fs::try_exists(local).await.unwrap_or(false) {
            return Err(RemoteError::LocalFileMissing(local.to_path_buf()));
        }

        let mut scp = Command::new("scp");
        scp.args(self.common_args("-P"))
            .arg("--")
            .arg(local)
            .arg(format!("{}:{remote}", self.destination(host)?));

        let copied = run_with_timeout(&mut scp, "scp", "upload", self.timeout).await?;
        if !copied.success() {
            return Err(RemoteError::NonZeroExit {
                operation: "upload",
                exit_code: copied.exit_code,
                stderr: copied.stderr.trim().to_string(),
            });
        }

        let chmod = self
            .ssh(host, &format!("chmod +x {remote}"), "chmod")
            .await?;
        if !chmod.success() {
            return Err(RemoteError::NonZeroExit {
                operation: "chmod",
                exit_code: chmod.exit_code,
                stderr: chmod.stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    async fn run(
        &self,
        host: &str,
        program: &str,
        args: &[String],
    ) -> Result<CommandOutput, RemoteError> {
        ensure(is_safe_path(program), "program", program)?;
        let mut command_line = program.to_string();
        for arg in args {
            ensure(is_safe_token(arg), "argument", arg)?;
            command_line.push(' ');
            command_line.push_str(arg);
        }

        self.ssh(host, &command_line, "helper script").await
    }
}

/// Spawn `cmd`, capture stdout/stderr, and enforce `timeout`.
async fn run_with_timeout(
    cmd: &mut Command,
    program: &'static str,
    operation: &'static str,
    timeout: Duration,
) -> Result<CommandOutput, RemoteError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|source| RemoteError::Spawn { program, source })?;

    // Read the pipes concurrently with `wait()` so a chatty child can't
    // block on a full pipe.
    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Ok(Err(source)) => Err(RemoteError::Spawn { program, source }),
        Err(_elapsed) => {
            stdout_task.abort();
            stderr_task.abort();
            Err(RemoteError::Timeout {
                operation,
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Read up to `MAX_OUTPUT_BYTES`, then drain and discard the rest so the
/// child never blocks on a full pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let mut limited = h.take(MAX_OUTPUT_BYTES);
        let _ = limited.read_to_end(&mut buf).await;

        let mut rest = limited.into_inner();
        let discarded = tokio::io::copy(&mut rest, &mut tokio::io::sink())
            .await
            .unwrap_or(0);
        if discarded > 0 {
            tracing::warn!(
                kept_bytes = buf.len(),
                discarded_bytes = discarded,
                "Remote output exceeded capture limit, truncated",
            );
        }
    }
    buf
}
