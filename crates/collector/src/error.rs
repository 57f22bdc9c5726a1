use std::path::PathBuf;

/// The inventory could not be listed; the whole cycle is skipped.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// A single remote operation failed.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Invalid remote argument: {0}")]
    InvalidArgument(String),

    #[error("Local file not found: {}", .0.display())]
    LocalFileMissing(PathBuf),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout {
        operation: &'static str,
        elapsed_ms: u64,
    },

    #[error("{operation} exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        operation: &'static str,
        exit_code: i32,
        stderr: String,
    },
}

/// Probing one VM failed; the VM is skipped for this cycle.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to install helper script on {host}: {source}")]
    Bootstrap {
        host: String,
        #[source]
        source: RemoteError,
    },

    #[error("Helper script failed on {host}: {source}")]
    Execution {
        host: String,
        #[source]
        source: RemoteError,
    },

    #[error("Helper script on {host} produced no output")]
    EmptyOutput { host: String },
}

/// A collection cycle did not run.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Another collection cycle is still running")]
    AlreadyRunning,
}
