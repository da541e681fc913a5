use thiserror::Error;

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Timed out: {what}")]
    Timeout { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Unsupported protocol: {0}")]
    Unsupported(String),
}

impl AdapterError {
    /// True when the link itself is gone and the owner should disconnect.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            AdapterError::NotConnected
                | AdapterError::ConnectFailed(_)
                | AdapterError::Timeout { .. }
                | AdapterError::Io(_)
        )
    }

    /// Classify an I/O error, folding timeouts into [`AdapterError::Timeout`].
    pub fn from_io(err: std::io::Error, what: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                AdapterError::Timeout {
                    what: what.to_string(),
                }
            }
            _ => AdapterError::Io(err),
        }
    }
}
