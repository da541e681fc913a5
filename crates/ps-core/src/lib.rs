//! ps-core: stable foundation for the process simulator.
//!
//! Contains:
//! - numeric (Real + tolerances + clamping and range mapping)
//! - clock (injectable monotonic time for the cycle driver)
//! - timing (cycle phase timers)
//! - error (shared error types)

pub mod clock;
pub mod error;
pub mod numeric;
pub mod timing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use numeric::*;
