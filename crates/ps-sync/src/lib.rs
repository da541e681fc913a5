//! ps-sync: the controller I/O synchronization core.
//!
//! Contains:
//! - engine (IoSyncEngine: read path, write path, actuator release)
//! - debounce (TON per command signal)
//! - pulse (minimum-length operator button pulses)
//! - force (operator force overrides)
//! - error (SyncError)

pub mod debounce;
pub mod engine;
pub mod error;
pub mod force;
pub mod pulse;

pub use debounce::{DEFAULT_TON_WINDOW, Ton};
pub use engine::{DEFAULT_FORCE_WRITE_WINDOW, IoSyncEngine, SyncIo, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use force::{ForcedValue, ForcedValues};
pub use pulse::{ButtonPulses, DEFAULT_MIN_PULSE};
