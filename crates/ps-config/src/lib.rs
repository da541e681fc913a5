//! ps-config: signal catalog, controller addresses and signal map files.

pub mod address;
pub mod map;
pub mod schema;
pub mod signal;

use std::path::Path;

pub use address::{IoAddress, SignalType, parse_legacy_address};
pub use map::{AddressMap, Conflict, DEFAULT_BYTE_RANGE, ReloadReport, SkippedEntry};
pub use schema::{NumberField, SignalEntry, SignalMapFile};
pub use signal::{Direction, Signal, SignalSpec};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid address for {signal}: {address}")]
    InvalidAddress {
        signal: &'static str,
        address: String,
    },

    #[error("Type mismatch for {signal}: expected {expected:?} address")]
    TypeMismatch {
        signal: &'static str,
        expected: SignalType,
    },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &Path) -> ConfigResult<SignalMapFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

pub fn save_yaml(path: &Path, file: &SignalMapFile) -> ConfigResult<()> {
    let content = serde_yaml::to_string(file)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ConfigResult<SignalMapFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_json(path: &Path, file: &SignalMapFile) -> ConfigResult<()> {
    let content = serde_json::to_string_pretty(file)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a signal map, picking the format from the file extension.
pub fn load_signal_map(path: &Path) -> ConfigResult<SignalMapFile> {
    match Format::of(path)? {
        Format::Json => load_json(path),
        Format::Yaml => load_yaml(path),
    }
}

pub fn save_signal_map(path: &Path, file: &SignalMapFile) -> ConfigResult<()> {
    match Format::of(path)? {
        Format::Json => save_json(path, file),
        Format::Yaml => save_yaml(path, file),
    }
}

enum Format {
    Json,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> ConfigResult<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}
