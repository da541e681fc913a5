//! Transport delay for actuator fractions.
//!
//! A fixed-capacity ring of actuator snapshots, one per tick. Each delayed
//! attribute has its own delay; the ring is sized for the largest one.

use tracing::debug;

use crate::params::TankParams;
use crate::status::ProcessStatus;

/// Attributes that can be read with a lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayedAttr {
    /// Lagged by the volume delay.
    ValveIn,
    /// Lagged by the volume delay.
    ValveOut,
    /// Lagged by the temperature delay.
    Heater,
}

/// Snapshot of the fields that can be delayed, stamped with simulation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayedSample {
    pub at_s: f64,
    pub valve_in: f64,
    pub valve_out: f64,
    pub heater: f64,
}

impl DelayedSample {
    pub fn capture(status: &ProcessStatus, at_s: f64) -> Self {
        Self {
            at_s,
            valve_in: status.valve_in_fraction,
            valve_out: status.valve_out_fraction,
            heater: status.heater_fraction,
        }
    }

    pub fn get(&self, attr: DelayedAttr) -> f64 {
        match attr {
            DelayedAttr::ValveIn => self.valve_in,
            DelayedAttr::ValveOut => self.valve_out,
            DelayedAttr::Heater => self.heater,
        }
    }
}

/// Whole ticks needed to cover `delay_s` at `interval_s` per tick.
///
/// Zero means no delay. Rounds up so a value is never seen early.
pub fn delay_steps(delay_s: f64, interval_s: f64) -> usize {
    if !(delay_s > 0.0) || !(interval_s > 0.0) || !delay_s.is_finite() {
        return 0;
    }
    let ratio = delay_s / interval_s;
    (ratio - 1e-9).ceil().max(1.0) as usize
}

#[derive(Debug, Clone, Default)]
pub struct DelayQueue {
    volume_delay: f64,
    temperature_delay: f64,
    interval: f64,
    /// History depth in ticks; zero disables the queue.
    depth: usize,
    /// Holds `depth + 1` samples once warm: the newest plus `depth` older ones.
    ring: Vec<DelayedSample>,
    head: usize,
    pushed: u64,
}

impl DelayQueue {
    pub fn new(params: &TankParams) -> Self {
        let mut queue = Self::default();
        queue.configure(params);
        queue
    }

    /// Re-size for changed delays or tick interval. Clears history on change.
    pub fn configure(&mut self, params: &TankParams) {
        if self.volume_delay == params.volume_delay
            && self.temperature_delay == params.temperature_delay
            && self.interval == params.simulation_interval
        {
            return;
        }
        self.volume_delay = params.volume_delay;
        self.temperature_delay = params.temperature_delay;
        self.interval = params.simulation_interval;
        self.depth = delay_steps(self.volume_delay, self.interval)
            .max(delay_steps(self.temperature_delay, self.interval));
        self.clear();
        debug!(depth = self.depth, "delay queue resized");
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.ring.reserve(self.depth + 1);
        self.head = 0;
        self.pushed = 0;
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_enabled(&self) -> bool {
        self.depth > 0
    }

    pub fn push(&mut self, status: &ProcessStatus, at_s: f64) {
        if self.depth == 0 {
            return;
        }
        let sample = DelayedSample::capture(status, at_s);
        if self.ring.len() < self.depth + 1 {
            self.ring.push(sample);
            self.head = self.ring.len() - 1;
        } else {
            self.head = (self.head + 1) % self.ring.len();
            self.ring[self.head] = sample;
        }
        self.pushed += 1;
    }

    fn delay_for(&self, attr: DelayedAttr) -> f64 {
        match attr {
            DelayedAttr::ValveIn | DelayedAttr::ValveOut => self.volume_delay,
            DelayedAttr::Heater => self.temperature_delay,
        }
    }

    /// Value of `attr` as it was its configured delay ago.
    ///
    /// Returns `current` when the attribute has no delay or nothing has been
    /// pushed yet. While the history is still shorter than the delay, the
    /// oldest sample is returned instead of `current`, so an actuator change
    /// made during warm-up still reaches the physics no earlier than its delay.
    pub fn delayed(&self, attr: DelayedAttr, current: &ProcessStatus) -> f64 {
        let steps = delay_steps(self.delay_for(attr), self.interval);
        if steps == 0 || self.depth == 0 {
            return DelayedSample::capture(current, 0.0).get(attr);
        }
        if self.pushed <= steps as u64 {
            return match self.ring.first() {
                Some(oldest) => oldest.get(attr),
                None => DelayedSample::capture(current, 0.0).get(attr),
            };
        }
        let len = self.ring.len();
        let idx = (self.head + len - steps) % len;
        self.ring[idx].get(attr)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn step_never_seen_early(delay_ticks in 1usize..20, step_at in 1usize..30) {
            let interval = 0.1;
            let p = TankParams {
                volume_delay: delay_ticks as f64 * interval,
                simulation_interval: interval,
                ..Default::default()
            };
            let mut queue = DelayQueue::new(&p);
            for cycle in 0..(step_at + delay_ticks + 5) {
                let status = ProcessStatus {
                    valve_in_fraction: if cycle >= step_at { 1.0 } else { 0.0 },
                    ..Default::default()
                };
                queue.push(&status, cycle as f64 * interval);
                let seen = queue.delayed(DelayedAttr::ValveIn, &status);
                prop_assert_eq!(seen == 1.0, cycle >= step_at + delay_ticks);
            }
        }
    }
}
