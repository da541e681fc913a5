//! Minimum-length pulses for operator buttons.
//!
//! A click shorter than one cycle would otherwise never reach the
//! controller. A press raises the command at once; it stays raised while the
//! button is held and for at least the minimum pulse after the press.
//!
//! Command bits are debounced before they are written, so a pulse has to
//! span two sync passes plus the debounce window to be seen at all.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use ps_process::{Command, ProcessStatus};
use tracing::trace;

pub const DEFAULT_MIN_PULSE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct Pulse {
    held: bool,
    ends_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ButtonPulses {
    min_pulse: Duration,
    active: BTreeMap<Command, Pulse>,
}

impl Default for ButtonPulses {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PULSE)
    }
}

impl ButtonPulses {
    pub fn new(min_pulse: Duration) -> Self {
        Self {
            min_pulse,
            active: BTreeMap::new(),
        }
    }

    /// Pulses long enough to survive the command debounce when syncs run
    /// every `cycle`.
    pub fn for_cycle(cycle: Duration, ton_window: Duration) -> Self {
        Self::new(DEFAULT_MIN_PULSE.max(cycle * 2 + ton_window))
    }

    pub fn min_pulse(&self) -> Duration {
        self.min_pulse
    }

    pub fn press(&mut self, cmd: Command, status: &mut ProcessStatus, now: Instant) {
        status.set_command(cmd, true);
        self.active.insert(
            cmd,
            Pulse {
                held: true,
                ends_at: now + self.min_pulse,
            },
        );
        trace!(?cmd, "button pressed");
    }

    pub fn release(&mut self, cmd: Command) {
        if let Some(pulse) = self.active.get_mut(&cmd) {
            pulse.held = false;
        }
    }

    /// Press and release in one go; the pulse still lasts the minimum.
    pub fn click(&mut self, cmd: Command, status: &mut ProcessStatus, now: Instant) {
        self.press(cmd, status, now);
        self.release(cmd);
    }

    pub fn is_active(&self, cmd: Command) -> bool {
        self.active.contains_key(&cmd)
    }

    /// Drop every pulse that is released and expired.
    pub fn update(&mut self, status: &mut ProcessStatus, now: Instant) {
        self.active.retain(|cmd, pulse| {
            let done = !pulse.held && now >= pulse.ends_at;
            if done {
                status.set_command(*cmd, false);
                trace!(?cmd, "button pulse ended");
            }
            !done
        });
    }
}
