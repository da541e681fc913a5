//! Shared application service layer for the process simulator.
//!
//! Wires the controller link, the sync engine and the simulation manager into
//! one cycle driver used by every front end.

pub mod driver;
pub mod error;
pub mod settings;

pub use driver::{CycleDriver, CycleReport};
pub use error::{AppError, AppResult};
pub use settings::MainSettings;
