//! Remote execution capability used to bootstrap and run the helper script.
//!
//! [`RemoteExecutor`] is the narrow contract the probe needs: check for a
//! file, install an executable, run a program. The production
//! implementation is [`SshExecutor`](crate::ssh::SshExecutor); tests plug in
//! in-memory fakes.

use std::path::Path;

use async_trait::async_trait;

use crate::error::RemoteError;

/// Captured result of a remote command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (`-1` if the process was killed by a signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Whether a regular file exists at `path` on `host`.
    async fn file_exists(&self, host: &str, path: &str) -> Result<bool, RemoteError>;

    /// Copy `local` to `remote` on `host` and mark it executable.
    async fn upload_executable(
        &self,
        host: &str,
        local: &Path,
        remote: &str,
    ) -> Result<(), RemoteError>;

    /// Run `program` with `args` on `host`.
    ///
    /// A non-zero exit is still `Ok`; only transport failures and timeouts
    /// are errors.
    async fn run(
        &self,
        host: &str,
        program: &str,
        args: &[String],
    ) -> Result<CommandOutput, RemoteError>;
}

/// Plain token: alphanumeric, hyphen, underscore, dot. Never starts with a
/// hyphen so it can't be read as an option.
pub fn is_safe_token(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 255
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Host name or address: a safe token that may also contain `:` (IPv6).
pub fn is_safe_host(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 255
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Absolute or relative path made of safe tokens separated by `/`.
pub fn is_safe_path(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 4096
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

pub(crate) fn ensure(valid: bool, what: &str, value: &str) -> Result<(), RemoteError> {
    if valid {
        Ok(())
    } else {
        Err(RemoteError::InvalidArgument(format!(
            "{what} '{value}' contains unsupported characters"
        )))
    }
}
