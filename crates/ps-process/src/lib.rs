//! ps-process: physical process state and models.
//!
//! Contains:
//! - status (ProcessStatus, control mode, operator commands)
//! - params (TankParams)
//! - delay (DelayQueue for actuator transport delay)
//! - error (ProcessError for parameter validation)
//! - model (ProcessModel trait)
//! - tank (TankModel)

pub mod delay;
pub mod error;
pub mod model;
pub mod params;
pub mod status;
pub mod tank;

pub use delay::{DelayQueue, DelayedAttr, DelayedSample, delay_steps};
pub use error::{ProcessError, ProcessResult};
pub use model::{ProcessModel, TickOutcome};
pub use params::TankParams;
pub use status::{Command, ControlMode, ControlSource, ProcessStatus};
pub use tank::TankModel;
