use ps_core::CoreError;
use thiserror::Error;

pub type ProcessResult<T> = Result<T, ProcessError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error("Parameter {name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("Parameter {name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("Parameter {name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

impl From<CoreError> for ProcessError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NonFinite { what, value } => ProcessError::NonFinite { name: what, value },
        }
    }
}
