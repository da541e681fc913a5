use thiserror::Error;

use ps_protocol::AdapterError;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

impl SyncError {
    /// True when the owner should drop the controller link.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            SyncError::Adapter(e) => e.is_connection_loss(),
        }
    }
}
