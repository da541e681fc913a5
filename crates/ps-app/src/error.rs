//! Error types for the ps-app service layer.

use std::path::PathBuf;

/// Unified error for the driver and its front ends.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read settings file: {path}")]
    SettingsFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write settings file: {path}")]
    SettingsFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Signal map error: {0}")]
    Config(#[from] ps_config::ConfigError),

    #[error("Controller link error: {0}")]
    Adapter(#[from] ps_protocol::AdapterError),

    #[error("Sync error: {0}")]
    Sync(#[from] ps_sync::SyncError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] ps_sim::SimError),
}

/// Result type for ps-app operations.
pub type AppResult<T> = Result<T, AppError>;
