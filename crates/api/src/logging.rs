//! Tracing subscriber setup.
//!
//! Console and file sinks are toggled independently; both share the same
//! `RUST_LOG` filter and output format. The file sink rotates by size,
//! keeping a fixed number of numbered backups (`<path>.1` is the newest).

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use gpuvm_core::error::CoreError;
use gpuvm_core::settings::{env_lookup, flag_or, parse_or, string_or};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

const DEFAULT_FILTER: &str = "gpuvm_api=info,gpuvm_collector=info,gpuvm_db=info,tower_http=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration loaded from environment variables.
///
/// | Env Var              | Default               |
/// |----------------------|-----------------------|
/// | `LOG_TO_CONSOLE`     | `true`                |
/// | `LOG_TO_FILE`        | `false`               |
/// | `LOG_FILE_PATH`      | `gpu_vm_exporter.log` |
/// | `LOG_FILE_MAX_BYTES` | `5000000`             |
/// | `LOG_FILE_BACKUPS`   | `3`                   |
/// | `LOG_FORMAT`         | `text` (or `json`)    |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub to_console: bool,
    pub to_file: bool,
    pub file_path: PathBuf,
    /// Size at which the log file is rotated.
    pub max_file_bytes: usize,
    /// Rotated files kept next to the live one.
    pub backup_count: usize,
    pub format: LogFormat,
}

/// Default rotation threshold for the log file.
pub const DEFAULT_MAX_FILE_BYTES: usize = 5_000_000;

/// Default number of rotated log files kept.
pub const DEFAULT_BACKUP_COUNT: usize = 3;

impl LogConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<L>(lookup: &L) -> Result<Self, CoreError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let format = match lookup("LOG_FORMAT").map(|f| f.trim().to_ascii_lowercase()) {
            None => LogFormat::Text,
            Some(f) if f == "text" => LogFormat::Text,
            Some(f) if f == "json" => LogFormat::Json,
            Some(other) => {
                return Err(CoreError::InvalidSetting {
                    key: "LOG_FORMAT",
                    value: other,
                    expected: "`text` or `json`",
                })
            }
        };

        let max_file_bytes: usize = parse_or(
            lookup,
            "LOG_FILE_MAX_BYTES",
            DEFAULT_MAX_FILE_BYTES,
            "a positive number of bytes",
        )?;
        if max_file_bytes == 0 {
            return Err(CoreError::InvalidSetting {
                key: "LOG_FILE_MAX_BYTES",
                value: "0".to_string(),
                expected: "a positive number of bytes",
            });
        }

        Ok(Self {
            to_console: flag_or(lookup, "LOG_TO_CONSOLE", true),
            to_file: flag_or(lookup, "LOG_TO_FILE", false),
            file_path: PathBuf::from(string_or(lookup, "LOG_FILE_PATH", "gpu_vm_exporter.log")),
            max_file_bytes,
            backup_count: parse_or(
                lookup,
                "LOG_FILE_BACKUPS",
                DEFAULT_BACKUP_COUNT,
                "a whole number of files",
            )?,
            format,
        })
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Size-rotated writer for the configured log file.
pub fn rotating_writer(config: &LogConfig) -> std::io::Result<FileRotate<AppendCount>> {
    // FileRotate only reports an unwritable path on the first write.
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file_path)?;

    Ok(FileRotate::new(
        &config.file_path,
        AppendCount::new(config.backup_count),
        ContentLimit::Bytes(config.max_file_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

/// Build the configured sinks. Fails only if the log file can't be opened.
pub fn build_layers(config: &LogConfig) -> std::io::Result<Vec<BoxedLayer>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.to_console {
        let layer = tracing_subscriber::fmt::layer();
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    if config.to_file {
        let writer = rotating_writer(config)?;
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(writer));
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    Ok(layers)
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) -> std::io::Result<()> {
    let layers = build_layers(config)?;

    tracing_subscriber::registry()
        .with(layers)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .init();

    Ok(())
}
