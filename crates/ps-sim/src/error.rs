use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Simulation not registered: {0}")]
    UnknownSimulation(String),

    #[error("No active simulation")]
    NoActiveSimulation,

    #[error("Failed to construct simulation {kind}: {reason}")]
    Construct { kind: String, reason: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Cannot convert {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("State file is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    #[error("Config error: {0}")]
    Config(#[from] ps_config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
