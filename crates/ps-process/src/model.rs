//! ProcessModel trait for pluggable physical processes.

use crate::status::ProcessStatus;

/// What a single `tick` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Run flag is off; state left untouched.
    Stopped,
    /// First tick after the run flag turned on; integration skipped.
    Started,
    /// State integrated over `dt`.
    Advanced,
}

/// Trait for real-time process models.
///
/// A ProcessModel must implement:
/// - a parameter type holding the physical constants
/// - `tick`: advance `status` by `dt` seconds of wall-clock time
/// - `reset`: forget any internal history (delay queues, run edge detection)
pub trait ProcessModel {
    /// Physical constants.
    type Params;

    /// Advance the process by `dt` seconds.
    ///
    /// Never fails: out-of-range configuration is clamped, not reported.
    fn tick(&mut self, params: &Self::Params, status: &mut ProcessStatus, dt: f64) -> TickOutcome;

    /// Drop internal history.
    fn reset(&mut self);
}
