//! Timer-on-delay debounce for operator command bits.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ps_config::Signal;

pub const DEFAULT_TON_WINDOW: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy)]
struct TonState {
    value: bool,
    since: Instant,
}

/// Per-signal TON: a desired level is only released once it has been held
/// unchanged for the whole window. Every change restarts the timer.
#[derive(Debug, Clone)]
pub struct Ton {
    window: Duration,
    states: HashMap<Signal, TonState>,
}

impl Default for Ton {
    fn default() -> Self {
        Self::new(DEFAULT_TON_WINDOW)
    }
}

impl Ton {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            states: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Observe `desired` for `signal` at `now`; true once it has been stable
    /// for at least the window. The first observation never releases.
    pub fn ready(&mut self, signal: Signal, desired: bool, now: Instant) -> bool {
        match self.states.get_mut(&signal) {
            None => {
                self.states.insert(
                    signal,
                    TonState {
                        value: desired,
                        since: now,
                    },
                );
                false
            }
            Some(state) if state.value != desired => {
                state.value = desired;
                state.since = now;
                false
            }
            Some(state) => now.saturating_duration_since(state.since) >= self.window,
        }
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn first_observation_waits() {
        let mut ton = Ton::default();
        let t0 = Instant::now();
        assert!(!ton.ready(Signal::Start, true, t0));
        assert!(!ton.ready(Signal::Start, true, t0 + 29 * MS));
        assert!(ton.ready(Signal::Start, true, t0 + 30 * MS));
    }

    #[test]
    fn change_restarts_the_window() {
        let mut ton = Ton::default();
        let t0 = Instant::now();
        ton.ready(Signal::Start, false, t0);
        assert!(ton.ready(Signal::Start, false, t0 + 40 * MS));
        assert!(!ton.ready(Signal::Start, true, t0 + 50 * MS));
        assert!(!ton.ready(Signal::Start, true, t0 + 70 * MS));
        assert!(ton.ready(Signal::Start, true, t0 + 80 * MS));
    }

    #[test]
    fn signals_are_independent() {
        let mut ton = Ton::new(10 * MS);
        let t0 = Instant::now();
        ton.ready(Signal::Start, true, t0);
        ton.ready(Signal::Stop, true, t0 + 8 * MS);
        assert!(ton.ready(Signal::Start, true, t0 + 10 * MS));
        assert!(!ton.ready(Signal::Stop, true, t0 + 10 * MS));
    }
}
