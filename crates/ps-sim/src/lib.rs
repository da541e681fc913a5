//! ps-sim: simulation instances, their manager and persisted sessions.
//!
//! Contains:
//! - simulation (Simulation trait)
//! - tank (TankSimulation)
//! - manager (SimulationManager: registry and active instance)
//! - field (flat field dictionaries with typed coercion)
//! - state (save/load/validate of session files)
//! - error (SimError)

pub mod error;
pub mod field;
pub mod manager;
pub mod simulation;
pub mod state;
pub mod tank;

pub use error::{SimError, SimResult};
pub use field::{FieldMap, FieldValue, ImportReport};
pub use manager::{SimulationFactory, SimulationManager};
pub use simulation::{SimParts, Simulation};
pub use state::{
    LoadReport, MainConfig, STATE_VERSION, StateDocument, StateSummary, load_state, read_state,
    save_state, validate_state_file, write_state,
};
pub use tank::{TANK_KIND, TankSimulation};
